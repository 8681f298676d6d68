use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission level a membership holds within one group.
///
/// Declared in ascending authority so the derived `Ord` is the authority
/// order: `Owner > Admin > Contributor > Viewer > RestrictedViewer`. Exactly
/// one membership per group holds `Owner`, and that member is the group's
/// creator (until an explicit ownership transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    RestrictedViewer,
    Viewer,
    Contributor,
    Admin,
    Owner,
}

impl Role {
    /// Role granted to members joining via invite code.
    pub const DEFAULT_ON_JOIN: Role = Role::RestrictedViewer;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Contributor => "contributor",
            Role::Viewer => "viewer",
            Role::RestrictedViewer => "restricted-viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "contributor" => Some(Role::Contributor),
            "viewer" => Some(Role::Viewer),
            "restricted-viewer" => Some(Role::RestrictedViewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// A stored photo. `storage_ref` is an opaque locator minted by the storage
/// backend — never interpreted here, only handed back to the same backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub group_id: Uuid,
    pub uploader_id: Uuid,
    pub storage_ref: String,
    pub mime_type: String,
    pub file_size: u64,
    pub sha256: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_order_is_authority_order() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Contributor);
        assert!(Role::Contributor > Role::Viewer);
        assert!(Role::Viewer > Role::RestrictedViewer);
    }

    #[test]
    fn role_strings_round_trip() {
        for role in [
            Role::Owner,
            Role::Admin,
            Role::Contributor,
            Role::Viewer,
            Role::RestrictedViewer,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("super-admin"), None);
    }
}
