//! User account operations. Passwords arrive here pre-hashed — hashing and
//! verification live with the HTTP auth layer, and this module treats hash
//! values as opaque strings.

use bytes::Bytes;
use snapvault_db::Database;
use snapvault_types::Error;
use snapvault_types::error::Result;
use snapvault_types::models::User;
use tracing::info;
use uuid::Uuid;

use crate::convert::user_from_row;
use crate::storage::Storage;
use crate::validate::{UploadContext, validate_upload};

const MAX_NAME_CHARS: usize = 64;
const MAX_BIO_CHARS: usize = 500;

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(Error::validation("name must be at most 64 characters"));
    }
    Ok(name)
}

/// Lowercased, trimmed, and structurally checked. Uniqueness is the
/// database's job.
fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::validation("invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(Error::validation("invalid email format"));
    }
    Ok(email)
}

pub fn register_user(db: &Database, name: &str, email: &str, password_hash: &str) -> Result<User> {
    let name = validate_name(name)?;
    let email = normalize_email(email)?;
    let id = Uuid::new_v4();

    let inserted = db.create_user(&id.to_string(), name, &email, password_hash)?;
    if !inserted {
        return Err(Error::validation("email already registered"));
    }

    info!("User {} registered", id);
    Ok(User {
        id,
        name: name.to_string(),
        email,
        bio: None,
        profile_picture: None,
        created_at: chrono::Utc::now(),
    })
}

pub fn get_profile(db: &Database, user_id: Uuid) -> Result<User> {
    let row = db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(Error::NotFound("user"))?;
    Ok(user_from_row(row))
}

pub fn update_bio(db: &Database, user_id: Uuid, bio: &str) -> Result<User> {
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(Error::validation("bio must be at most 500 characters"));
    }
    db.update_user_bio(&user_id.to_string(), bio)?;
    get_profile(db, user_id)
}

pub fn update_name(db: &Database, user_id: Uuid, name: &str) -> Result<User> {
    let name = validate_name(name)?;
    db.update_user_name(&user_id.to_string(), name)?;
    get_profile(db, user_id)
}

/// Change the account email. The caller verifies the current password
/// before invoking this.
pub fn update_email(db: &Database, user_id: Uuid, new_email: &str) -> Result<User> {
    let email = normalize_email(new_email)?;

    let current = get_profile(db, user_id)?;
    if current.email == email {
        return Err(Error::validation(
            "new email cannot be the same as the current email",
        ));
    }

    let updated = db.update_user_email(&user_id.to_string(), &email)?;
    if !updated {
        return Err(Error::validation("email already registered"));
    }
    get_profile(db, user_id)
}

pub fn update_password(db: &Database, user_id: Uuid, new_password_hash: &str) -> Result<()> {
    db.update_user_password(&user_id.to_string(), new_password_hash)?;
    Ok(())
}

/// Validate and store a new profile picture, replacing (and cleaning up)
/// any previous one.
pub async fn set_profile_picture(
    db: &Database,
    storage: &Storage,
    user_id: Uuid,
    mime_type: &str,
    bytes: Bytes,
) -> Result<User> {
    let previous = get_profile(db, user_id)?.profile_picture;

    let validated = validate_upload(mime_type, &bytes, UploadContext::ProfilePicture)?;
    let key = format!("profile_pictures/{}.{}", Uuid::new_v4(), validated.extension);
    let reference = storage.put(&key, &bytes).await?;

    db.update_user_profile_picture(&user_id.to_string(), &reference)?;

    if let Some(old) = previous {
        storage.delete(&old).await.ok();
    }
    get_profile(db, user_id)
}

/// Delete the account: owned groups go entirely (memberships and photos
/// cascade), other memberships are removed, and photos uploaded to groups
/// the user does not own are preserved with the uploader as a dangling
/// provenance reference.
pub async fn delete_account(db: &Database, storage: &Storage, user_id: Uuid) -> Result<()> {
    if db.get_user_by_id(&user_id.to_string())?.is_none() {
        return Err(Error::NotFound("user"));
    }

    let refs = db.delete_user(&user_id.to_string())?;
    let count = refs.len();
    for reference in refs {
        storage.delete(&reference).await.ok();
    }

    info!(
        "User {} deleted ({} stored files cleaned up)",
        user_id, count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Ana@Example.COM ").unwrap(),
            "ana@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@").is_err());
        assert!(normalize_email("ana@localhost").is_err());
    }

    #[test]
    fn bio_longer_than_500_chars_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let user = register_user(&db, "Ana", "ana@example.com", "hash").unwrap();

        assert!(update_bio(&db, user.id, &"x".repeat(501)).is_err());
        let updated = update_bio(&db, user.id, &"x".repeat(500)).unwrap();
        assert_eq!(updated.bio.as_deref(), Some("x".repeat(500).as_str()));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, "Ana", "ana@example.com", "hash").unwrap();

        let err = register_user(&db, "Impostor", "Ana@Example.com", "hash2").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
