//! Photo operations: validated uploads through the storage router, filtered
//! listings, tagging, and deletion.

use std::collections::HashMap;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use snapvault_db::Database;
use snapvault_types::api::{BatchFailure, BatchUploadResponse, PhotoFilter};
use snapvault_types::error::Result;
use snapvault_types::Error;
use snapvault_types::models::Photo;
use tracing::{info, warn};
use uuid::Uuid;

use crate::convert::photo_from_row;
use crate::groups::get_role;
use crate::policy::{Action, authorize, authorize_role};
use crate::storage::Storage;
use crate::validate::{MAX_BATCH_FILES, UploadContext, validate_upload};

/// One file of an upload request, as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

/// Upload a single photo. All-or-nothing: authorization or validation
/// failures store nothing, and a record is only written for durably stored
/// bytes — if the record write fails, the just-written file is removed.
pub async fn upload_photo(
    db: &Database,
    storage: &Storage,
    group_id: Uuid,
    uploader_id: Uuid,
    upload: NewUpload,
) -> Result<Photo> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, uploader_id, group_id, Action::UploadPhoto)?;

    store_one(db, storage, group_id, uploader_id, upload).await
}

/// Upload up to `MAX_BATCH_FILES` photos. Over-limit batches are rejected
/// upfront with nothing processed; within the limit, each file succeeds or
/// fails independently and the result reports both lists.
pub async fn batch_upload(
    db: &Database,
    storage: &Storage,
    group_id: Uuid,
    uploader_id: Uuid,
    files: Vec<NewUpload>,
) -> Result<BatchUploadResponse> {
    if files.len() > MAX_BATCH_FILES {
        return Err(Error::TooManyFiles {
            count: files.len(),
            limit: MAX_BATCH_FILES,
        });
    }
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, uploader_id, group_id, Action::UploadPhoto)?;

    let mut successful = Vec::new();
    let mut failed = Vec::new();
    for upload in files {
        let filename = upload.filename.clone();
        match store_one(db, storage, group_id, uploader_id, upload).await {
            Ok(photo) => successful.push(photo),
            Err(e) => failed.push(BatchFailure {
                filename,
                error: e.kind(),
                message: e.to_string(),
            }),
        }
    }

    info!(
        "Batch upload to group {}: {} stored, {} rejected",
        group_id,
        successful.len(),
        failed.len()
    );
    Ok(BatchUploadResponse { successful, failed })
}

/// Validate, persist bytes, then write the record. Assumes the caller has
/// already authorized the uploader for this group.
async fn store_one(
    db: &Database,
    storage: &Storage,
    group_id: Uuid,
    uploader_id: Uuid,
    upload: NewUpload,
) -> Result<Photo> {
    let validated = validate_upload(&upload.mime_type, &upload.bytes, UploadContext::GroupPhoto)?;

    let sha256 = hex::encode(Sha256::digest(&upload.bytes));
    let id = Uuid::new_v4();
    let key = format!("photos/{}.{}", id, validated.extension);

    let reference = storage.put(&key, &upload.bytes).await?;

    let inserted = db.insert_photo(
        &id.to_string(),
        &group_id.to_string(),
        &uploader_id.to_string(),
        &reference,
        validated.mime_type,
        validated.size as i64,
        &sha256,
        upload.description.as_deref(),
        &upload.tags,
    );
    if let Err(e) = inserted {
        // Never leave bytes without a record: roll the file back.
        warn!("Photo record write failed, removing {}: {}", reference, e);
        storage.delete(&reference).await.ok();
        return Err(Error::Internal(e));
    }

    Ok(Photo {
        id,
        group_id,
        uploader_id,
        storage_ref: reference,
        mime_type: validated.mime_type.to_string(),
        file_size: validated.size,
        sha256,
        description: upload.description,
        tags: upload.tags,
        created_at: chrono::Utc::now(),
    })
}

/// List a group's photos with filtering and pagination. Ordered by upload
/// time, newest first unless the filter asks for ascending.
pub fn get_group_photos(
    db: &Database,
    requester: Uuid,
    group_id: Uuid,
    filter: &PhotoFilter,
) -> Result<Vec<Photo>> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, requester, group_id, Action::ViewPhotos)?;

    let rows = db.list_group_photos(&group_id.to_string(), filter)?;

    let photo_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut tag_map: HashMap<String, Vec<String>> = HashMap::new();
    for (photo_id, tag) in db.get_tags_for_photos(&photo_ids)? {
        tag_map.entry(photo_id).or_default().push(tag);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let tags = tag_map.remove(&row.id).unwrap_or_default();
            photo_from_row(row, tags)
        })
        .collect())
}

/// Fetch one photo's metadata (members only).
pub fn get_photo(db: &Database, requester: Uuid, photo_id: Uuid) -> Result<Photo> {
    let row = db
        .get_photo(&photo_id.to_string())?
        .ok_or(Error::NotFound("photo"))?;
    let group_id: Uuid = crate::convert::parse_uuid(&row.group_id, "group");
    authorize(db, requester, group_id, Action::ViewPhotos)?;

    let tags = db.get_photo_tags(&row.id)?;
    Ok(photo_from_row(row, tags))
}

/// Replace a photo's tags (and optionally its description). Contributor
/// and up.
pub fn update_tags(
    db: &Database,
    requester: Uuid,
    photo_id: Uuid,
    tags: Vec<String>,
    description: Option<&str>,
) -> Result<Photo> {
    let row = db
        .get_photo(&photo_id.to_string())?
        .ok_or(Error::NotFound("photo"))?;
    let group_id: Uuid = crate::convert::parse_uuid(&row.group_id, "group");
    authorize(db, requester, group_id, Action::TagPhoto)?;

    db.update_photo_tags(&row.id, &tags, description)?;

    let row = db
        .get_photo(&photo_id.to_string())?
        .ok_or(Error::NotFound("photo"))?;
    let tags = db.get_photo_tags(&row.id)?;
    Ok(photo_from_row(row, tags))
}

/// Delete a photo. Uploaders may remove their own photos (any member role);
/// removing someone else's requires admin. The record goes first, then the
/// bytes — a failed file delete leaves a cleanable orphan file, never a
/// dangling record.
pub async fn delete_photo(
    db: &Database,
    storage: &Storage,
    requester: Uuid,
    photo_id: Uuid,
) -> Result<()> {
    let row = db
        .get_photo(&photo_id.to_string())?
        .ok_or(Error::NotFound("photo"))?;
    let group_id: Uuid = crate::convert::parse_uuid(&row.group_id, "group");

    let own_photo = row.uploader_id == requester.to_string();
    let role = get_role(db, requester, group_id)?;
    if own_photo {
        // Membership is still required; the uploader may have left.
        if role.is_none() {
            return Err(Error::forbidden("not a member of this group"));
        }
    } else {
        authorize_role(role, Action::DeleteOthersPhotos)?;
    }

    if let Some(reference) = db.delete_photo(&row.id)? {
        if let Err(e) = storage.delete(&reference).await {
            warn!("Orphaned stored file {} after delete: {}", reference, e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapvault_types::Role;

    #[test]
    fn deleting_others_photos_needs_admin() {
        assert!(authorize_role(Some(Role::Contributor), Action::DeleteOthersPhotos).is_err());
        assert!(authorize_role(Some(Role::Admin), Action::DeleteOthersPhotos).is_ok());
    }
}
