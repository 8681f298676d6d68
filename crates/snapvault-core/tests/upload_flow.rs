//! Upload validation, storage round-trips, batch semantics, and photo
//! listing filters, against in-memory SQLite and a temp-dir local store.

use bytes::Bytes;
use snapvault_core::photos::{self, NewUpload};
use snapvault_core::storage::{FileStream, Storage, StorageConfig};
use snapvault_core::{groups, users};
use snapvault_db::Database;
use snapvault_types::api::PhotoFilter;
use snapvault_types::{Error, Role};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

struct TestEnv {
    db: Database,
    storage: Storage,
    root: std::path::PathBuf,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

async fn env() -> TestEnv {
    let root = std::env::temp_dir().join(format!("snapvault-test-{}", Uuid::new_v4()));
    let storage = Storage::init(StorageConfig::Local { root: root.clone() })
        .await
        .unwrap();
    TestEnv {
        db: Database::open_in_memory().unwrap(),
        storage,
        root,
    }
}

fn register(db: &Database, name: &str) -> Uuid {
    let email = format!("{}@example.com", name.to_lowercase());
    users::register_user(db, name, &email, "argon2-opaque-hash")
        .unwrap()
        .id
}

fn jpeg(len: usize) -> Bytes {
    let mut bytes = vec![0u8; len.max(4)];
    bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    Bytes::from(bytes)
}

fn upload(filename: &str, mime: &str, bytes: Bytes) -> NewUpload {
    NewUpload {
        filename: filename.to_string(),
        mime_type: mime.to_string(),
        bytes,
        tags: Vec::new(),
        description: None,
    }
}

/// Count files under the storage root, recursively.
fn stored_file_count(root: &std::path::Path) -> usize {
    fn walk(dir: &std::path::Path, count: &mut usize) {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, count);
                } else {
                    *count += 1;
                }
            }
        }
    }
    let mut count = 0;
    walk(root, &mut count);
    count
}

#[tokio::test]
async fn upload_then_list_round_trips_through_storage() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();

    let payload = jpeg(1024);
    let mut new_upload = upload("beach.jpg", "image/jpeg", payload.clone());
    new_upload.tags = vec!["beach".into()];
    new_upload.description = Some("first day".into());

    let photo = photos::upload_photo(&env.db, &env.storage, group.id, ana, new_upload)
        .await
        .unwrap();
    assert_eq!(photo.file_size, 1024);
    assert_eq!(photo.mime_type, "image/jpeg");

    let listed = photos::get_group_photos(&env.db, ana, group.id, &PhotoFilter::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, photo.id);
    assert_eq!(listed[0].tags, vec!["beach".to_string()]);
    assert_eq!(listed[0].description.as_deref(), Some("first day"));

    // the stored reference resolves through the same backend that wrote it
    let mut stream = match env.storage.open(&listed[0].storage_ref).await.unwrap() {
        FileStream::Local(file) => file,
        FileStream::Remote(_) => panic!("local backend expected"),
    };
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(Bytes::from(bytes), payload);
}

#[tokio::test]
async fn oversized_upload_leaves_no_record_and_no_file() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();

    // 11 MiB against the 10 MiB group-photo limit
    let big = jpeg(11 * 1024 * 1024);
    let err = photos::upload_photo(
        &env.db,
        &env.storage,
        group.id,
        ana,
        upload("huge.jpg", "image/jpeg", big),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::TooLarge { .. }));

    let listed = photos::get_group_photos(&env.db, ana, group.id, &PhotoFilter::default()).unwrap();
    assert!(listed.is_empty());
    assert_eq!(stored_file_count(&env.root), 0);
}

#[tokio::test]
async fn upload_requires_contributor() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let ben = register(&env.db, "Ben");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();
    groups::join_group(&env.db, ben, &group.invite_code).unwrap();

    // default join role is restricted-viewer: can view, cannot upload
    let err = photos::upload_photo(
        &env.db,
        &env.storage,
        group.id,
        ben,
        upload("a.jpg", "image/jpeg", jpeg(64)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert_eq!(stored_file_count(&env.root), 0);

    groups::set_member_role(&env.db, ana, group.id, ben, Role::Contributor).unwrap();
    assert!(
        photos::upload_photo(
            &env.db,
            &env.storage,
            group.id,
            ben,
            upload("a.jpg", "image/jpeg", jpeg(64)),
        )
        .await
        .is_ok()
    );
}

#[tokio::test]
async fn non_members_cannot_list_photos() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let dex = register(&env.db, "Dex");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();

    assert!(matches!(
        photos::get_group_photos(&env.db, dex, group.id, &PhotoFilter::default()),
        Err(Error::Forbidden(_))
    ));
}

#[tokio::test]
async fn batch_reports_per_file_outcomes() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();

    let png_pretending_to_be_jpeg = {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 64]);
        Bytes::from(bytes)
    };

    let files = vec![
        upload("ok-1.jpg", "image/jpeg", jpeg(64)),
        upload("doc.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.4")),
        upload("ok-2.jpg", "image/jpeg", jpeg(128)),
        upload("fake.jpg", "image/jpeg", png_pretending_to_be_jpeg),
    ];

    let result = photos::batch_upload(&env.db, &env.storage, group.id, ana, files)
        .await
        .unwrap();

    assert_eq!(result.successful.len(), 2);
    assert_eq!(result.failed.len(), 2);
    let failed_kinds: Vec<&str> = result.failed.iter().map(|f| f.error).collect();
    assert!(failed_kinds.contains(&"unsupported_type"));
    assert!(failed_kinds.contains(&"content_mismatch"));

    // exactly the successes were recorded and stored
    let listed = photos::get_group_photos(&env.db, ana, group.id, &PhotoFilter::default()).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(stored_file_count(&env.root), 2);
}

#[tokio::test]
async fn oversized_batches_are_rejected_upfront() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();

    let files: Vec<NewUpload> = (0..21)
        .map(|i| upload(&format!("photo-{i}.jpg"), "image/jpeg", jpeg(64)))
        .collect();

    let err = photos::batch_upload(&env.db, &env.storage, group.id, ana, files)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TooManyFiles { count: 21, limit: 20 }));

    // nothing was processed
    let listed = photos::get_group_photos(&env.db, ana, group.id, &PhotoFilter::default()).unwrap();
    assert!(listed.is_empty());
    assert_eq!(stored_file_count(&env.root), 0);
}

#[tokio::test]
async fn listing_filters_by_tag_uploader_and_page() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let ben = register(&env.db, "Ben");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();
    groups::join_group(&env.db, ben, &group.invite_code).unwrap();
    groups::set_member_role(&env.db, ana, group.id, ben, Role::Contributor).unwrap();

    for (uploader, name, tag) in [
        (ana, "a.jpg", Some("beach")),
        (ana, "b.jpg", None),
        (ben, "c.jpg", Some("beach")),
    ] {
        let mut file = upload(name, "image/jpeg", jpeg(64));
        file.tags = tag.map(|t| vec![t.to_string()]).unwrap_or_default();
        photos::upload_photo(&env.db, &env.storage, group.id, uploader, file)
            .await
            .unwrap();
    }

    let all = photos::get_group_photos(&env.db, ana, group.id, &PhotoFilter::default()).unwrap();
    assert_eq!(all.len(), 3);

    let beach = photos::get_group_photos(
        &env.db,
        ana,
        group.id,
        &PhotoFilter {
            tag: Some("beach".into()),
            ..PhotoFilter::default()
        },
    )
    .unwrap();
    assert_eq!(beach.len(), 2);
    assert!(beach.iter().all(|p| p.tags.contains(&"beach".to_string())));

    let bens = photos::get_group_photos(
        &env.db,
        ana,
        group.id,
        &PhotoFilter {
            uploader_id: Some(ben),
            ..PhotoFilter::default()
        },
    )
    .unwrap();
    assert_eq!(bens.len(), 1);
    assert_eq!(bens[0].uploader_id, ben);

    let page = photos::get_group_photos(
        &env.db,
        ana,
        group.id,
        &PhotoFilter {
            limit: 2,
            offset: 2,
            ..PhotoFilter::default()
        },
    )
    .unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn photo_deletion_rights() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let ben = register(&env.db, "Ben");
    let cara = register(&env.db, "Cara");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();
    groups::join_group(&env.db, ben, &group.invite_code).unwrap();
    groups::join_group(&env.db, cara, &group.invite_code).unwrap();
    groups::set_member_role(&env.db, ana, group.id, ben, Role::Contributor).unwrap();

    let photo = photos::upload_photo(
        &env.db,
        &env.storage,
        group.id,
        ben,
        upload("a.jpg", "image/jpeg", jpeg(64)),
    )
    .await
    .unwrap();

    // another non-admin member cannot delete it
    assert!(matches!(
        photos::delete_photo(&env.db, &env.storage, cara, photo.id).await,
        Err(Error::Forbidden(_))
    ));

    // the uploader can, and the bytes go too
    photos::delete_photo(&env.db, &env.storage, ben, photo.id).await.unwrap();
    assert!(matches!(
        photos::get_photo(&env.db, ben, photo.id),
        Err(Error::NotFound(_))
    ));
    assert_eq!(stored_file_count(&env.root), 0);

    // admins can delete others' photos
    let photo = photos::upload_photo(
        &env.db,
        &env.storage,
        group.id,
        ben,
        upload("b.jpg", "image/jpeg", jpeg(64)),
    )
    .await
    .unwrap();
    photos::delete_photo(&env.db, &env.storage, ana, photo.id).await.unwrap();
    assert_eq!(stored_file_count(&env.root), 0);
}

#[tokio::test]
async fn uploader_leaving_preserves_their_photos() {
    let env = env().await;
    let ana = register(&env.db, "Ana");
    let ben = register(&env.db, "Ben");
    let group = groups::create_group(&env.db, ana, "Trip", None).unwrap();
    groups::join_group(&env.db, ben, &group.invite_code).unwrap();
    groups::set_member_role(&env.db, ana, group.id, ben, Role::Contributor).unwrap();

    let photo = photos::upload_photo(
        &env.db,
        &env.storage,
        group.id,
        ben,
        upload("a.jpg", "image/jpeg", jpeg(64)),
    )
    .await
    .unwrap();

    groups::leave_group(&env.db, ben, group.id).unwrap();

    let listed = photos::get_group_photos(&env.db, ana, group.id, &PhotoFilter::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, photo.id);
    assert_eq!(listed[0].uploader_id, ben);
}
