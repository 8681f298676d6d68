//! Database row types — these map directly to SQLite rows.
//! Distinct from the snapvault-types API models to keep the DB layer
//! independent; timestamps stay as the TEXT strings SQLite stores.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub invite_code: String,
    pub created_at: String,
}

pub struct MembershipRow {
    pub group_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
}

/// Membership joined with the member's user record, for member listings.
pub struct MemberRow {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub joined_at: String,
}

pub struct PhotoRow {
    pub id: String,
    pub group_id: String,
    pub uploader_id: String,
    pub storage_ref: String,
    pub mime_type: String,
    pub file_size: i64,
    pub sha256: String,
    pub description: Option<String>,
    pub created_at: String,
}
