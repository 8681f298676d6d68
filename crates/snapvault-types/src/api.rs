use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Photo, Role};

// -- JWT Claims --

/// JWT claims shared between token issuance (auth handlers) and the request
/// middleware. Canonical definition lives here to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBioRequest {
    pub bio: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNameRequest {
    pub name: String,
}

/// Email changes re-verify the current password before taking effect.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmailRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}

#[derive(Debug, Serialize)]
pub struct JoinGroupResponse {
    pub group_id: Uuid,
    pub group_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetMemberRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferOwnershipRequest {
    pub new_owner_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

// -- Photos --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Filter and pagination parameters for photo listings. Doubles as the axum
/// query DTO and the core filter input.
#[derive(Debug, Deserialize)]
pub struct PhotoFilter {
    pub tag: Option<String>,
    pub uploader_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    /// Sort by upload time; newest first unless `asc` is requested.
    pub order: Option<SortOrder>,
}

fn default_limit() -> u32 {
    50
}

impl Default for PhotoFilter {
    fn default() -> Self {
        PhotoFilter {
            tag: None,
            uploader_id: None,
            from: None,
            to: None,
            limit: default_limit(),
            offset: 0,
            order: None,
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTagsRequest {
    pub tags: Vec<String>,
    pub description: Option<String>,
}

/// A photo plus the URL its storage reference currently resolves to. The
/// reference is what's persisted; the URL is derived per-request by the
/// active backend.
#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    #[serde(flatten)]
    pub photo: Photo,
    pub url: String,
}

/// Outcome of a batch upload: per-file partial success, unlike single upload
/// which is all-or-nothing.
#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub successful: Vec<Photo>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub filename: String,
    pub error: &'static str,
    pub message: String,
}
