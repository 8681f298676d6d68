//! Row-to-model conversion. SQLite hands back TEXT ids and timestamps;
//! corrupt values are logged and defaulted rather than failing the request.

use chrono::{DateTime, Utc};
use snapvault_db::models::{GroupRow, PhotoRow, UserRow};
use snapvault_types::Role;
use snapvault_types::models::{Group, Photo, User};
use tracing::warn;
use uuid::Uuid;

pub(crate) fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, s, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

pub(crate) fn parse_role(s: &str) -> Role {
    Role::parse(s).unwrap_or_else(|| {
        warn!("Unknown role '{}' in membership row", s);
        Role::RestrictedViewer
    })
}

pub(crate) fn user_from_row(row: UserRow) -> User {
    User {
        id: parse_uuid(&row.id, "user"),
        name: row.name,
        email: row.email,
        bio: row.bio,
        profile_picture: row.profile_picture,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn group_from_row(row: GroupRow) -> Group {
    Group {
        id: parse_uuid(&row.id, "group"),
        name: row.name,
        description: row.description,
        creator_id: parse_uuid(&row.creator_id, "user"),
        invite_code: row.invite_code,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn photo_from_row(row: PhotoRow, tags: Vec<String>) -> Photo {
    Photo {
        id: parse_uuid(&row.id, "photo"),
        group_id: parse_uuid(&row.group_id, "group"),
        uploader_id: parse_uuid(&row.uploader_id, "user"),
        storage_ref: row.storage_ref,
        mime_type: row.mime_type,
        file_size: row.file_size.max(0) as u64,
        sha256: row.sha256,
        description: row.description,
        tags,
        created_at: parse_timestamp(&row.created_at),
    }
}
