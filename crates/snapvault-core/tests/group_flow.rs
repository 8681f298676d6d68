//! Group lifecycle: creation, invite-code joins, role administration,
//! ownership transfer, and cascade deletion.

use snapvault_core::groups;
use snapvault_core::storage::{Storage, StorageConfig};
use snapvault_core::users;
use snapvault_db::Database;
use snapvault_types::{Error, Role};
use uuid::Uuid;

fn db() -> Database {
    Database::open_in_memory().unwrap()
}

fn register(db: &Database, name: &str) -> Uuid {
    let email = format!("{}@example.com", name.to_lowercase());
    users::register_user(db, name, &email, "argon2-opaque-hash")
        .unwrap()
        .id
}

async fn temp_storage() -> (Storage, std::path::PathBuf) {
    let root = std::env::temp_dir().join(format!("snapvault-test-{}", Uuid::new_v4()));
    let storage = Storage::init(StorageConfig::Local { root: root.clone() })
        .await
        .unwrap();
    (storage, root)
}

#[test]
fn creator_gets_the_only_owner_membership() {
    let db = db();
    let ana = register(&db, "Ana");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();

    assert_eq!(group.creator_id, ana);
    assert_eq!(group.invite_code.len(), 6);
    assert_eq!(groups::get_role(&db, ana, group.id).unwrap(), Some(Role::Owner));

    let members = groups::list_members(&db, ana, group.id).unwrap();
    let owners: Vec<_> = members.iter().filter(|m| m.role == Role::Owner).collect();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].user_id, ana);
}

#[test]
fn group_names_must_be_at_least_two_chars() {
    let db = db();
    let ana = register(&db, "Ana");
    assert!(matches!(
        groups::create_group(&db, ana, "x", None),
        Err(Error::Validation(_))
    ));
}

#[test]
fn joining_twice_fails_with_already_member() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();

    let (joined, role) = groups::join_group(&db, ben, &group.invite_code).unwrap();
    assert_eq!(joined.id, group.id);
    assert_eq!(role, Role::RestrictedViewer);

    assert!(matches!(
        groups::join_group(&db, ben, &group.invite_code),
        Err(Error::AlreadyMember)
    ));
    // The creator "joining" their own group hits the same constraint.
    assert!(matches!(
        groups::join_group(&db, ana, &group.invite_code),
        Err(Error::AlreadyMember)
    ));
}

#[test]
fn unknown_invite_code_is_not_found() {
    let db = db();
    let ana = register(&db, "Ana");
    assert!(matches!(
        groups::join_group(&db, ana, "ZZZZZZ"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn invite_codes_are_case_insensitive_on_join() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();

    let lowered = group.invite_code.to_lowercase();
    assert!(groups::join_group(&db, ben, &lowered).is_ok());
}

#[test]
fn members_can_leave_but_the_owner_cannot() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();
    groups::join_group(&db, ben, &group.invite_code).unwrap();

    assert!(matches!(
        groups::leave_group(&db, ana, group.id),
        Err(Error::Forbidden(_))
    ));

    groups::leave_group(&db, ben, group.id).unwrap();
    assert_eq!(groups::get_role(&db, ben, group.id).unwrap(), None);
}

#[test]
fn role_changes_take_effect_immediately() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();
    groups::join_group(&db, ben, &group.invite_code).unwrap();

    // restricted-viewer cannot touch group metadata
    assert!(matches!(
        groups::update_group(&db, ben, group.id, Some("Renamed"), None),
        Err(Error::Forbidden(_))
    ));

    groups::set_member_role(&db, ana, group.id, ben, Role::Admin).unwrap();
    let updated = groups::update_group(&db, ben, group.id, Some("Renamed"), None).unwrap();
    assert_eq!(updated.name, "Renamed");

    // and a downgrade revokes it again, with no caching in between
    groups::set_member_role(&db, ana, group.id, ben, Role::Viewer).unwrap();
    assert!(matches!(
        groups::update_group(&db, ben, group.id, Some("Again"), None),
        Err(Error::Forbidden(_))
    ));
}

#[test]
fn member_role_administration_rules() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let cara = register(&db, "Cara");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();
    groups::join_group(&db, ben, &group.invite_code).unwrap();
    groups::join_group(&db, cara, &group.invite_code).unwrap();
    groups::set_member_role(&db, ana, group.id, ben, Role::Admin).unwrap();

    // admins cannot change their own level, the owner's, or grant owner
    assert!(matches!(
        groups::set_member_role(&db, ben, group.id, ben, Role::Owner),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        groups::set_member_role(&db, ben, group.id, ana, Role::Viewer),
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        groups::set_member_role(&db, ben, group.id, cara, Role::Owner),
        Err(Error::Validation(_))
    ));

    groups::set_member_role(&db, ben, group.id, cara, Role::Contributor).unwrap();
    assert_eq!(
        groups::get_role(&db, cara, group.id).unwrap(),
        Some(Role::Contributor)
    );
}

#[test]
fn ownership_transfer_keeps_exactly_one_owner() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();
    groups::join_group(&db, ben, &group.invite_code).unwrap();

    // target must be a member
    let outsider = register(&db, "Dex");
    assert!(matches!(
        groups::transfer_ownership(&db, ana, group.id, outsider),
        Err(Error::NotFound(_))
    ));

    groups::transfer_ownership(&db, ana, group.id, ben).unwrap();
    assert_eq!(groups::get_role(&db, ben, group.id).unwrap(), Some(Role::Owner));
    assert_eq!(
        groups::get_role(&db, ana, group.id).unwrap(),
        Some(Role::RestrictedViewer)
    );

    let members = groups::list_members(&db, ben, group.id).unwrap();
    assert_eq!(members.iter().filter(|m| m.role == Role::Owner).count(), 1);

    // the previous owner is an ordinary member now and may leave
    groups::leave_group(&db, ana, group.id).unwrap();
}

#[tokio::test]
async fn delete_group_cascades_and_is_owner_only() {
    let db = db();
    let (storage, root) = temp_storage().await;
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let group = groups::create_group(&db, ana, "Trip", None).unwrap();
    groups::join_group(&db, ben, &group.invite_code).unwrap();

    assert!(matches!(
        groups::delete_group(&db, &storage, ben, group.id).await,
        Err(Error::Forbidden(_))
    ));

    groups::delete_group(&db, &storage, ana, group.id).await.unwrap();
    assert_eq!(groups::get_role(&db, ben, group.id).unwrap(), None);
    assert_eq!(groups::get_role(&db, ana, group.id).unwrap(), None);
    assert!(matches!(
        groups::get_group(&db, ana, group.id),
        Err(Error::NotFound(_))
    ));
    // the invite code is free for reuse once the group is gone
    assert!(matches!(
        groups::join_group(&db, ben, &group.invite_code),
        Err(Error::NotFound(_))
    ));

    std::fs::remove_dir_all(root).ok();
}

#[tokio::test]
async fn deleting_an_account_removes_owned_groups_but_spares_joined_ones() {
    let db = db();
    let ana = register(&db, "Ana");
    let ben = register(&db, "Ben");
    let owned = groups::create_group(&db, ana, "Ana's trip", None).unwrap();
    let joined = groups::create_group(&db, ben, "Ben's trip", None).unwrap();
    groups::join_group(&db, ana, &joined.invite_code).unwrap();
    groups::join_group(&db, ben, &owned.invite_code).unwrap();

    let (storage, root) = temp_storage().await;
    users::delete_account(&db, &storage, ana).await.unwrap();
    std::fs::remove_dir_all(root).ok();

    // Ana's group is gone entirely; Ben's group lost only Ana's membership
    assert!(db.get_group(&owned.id.to_string()).unwrap().is_none());
    assert_eq!(groups::get_role(&db, ben, owned.id).unwrap(), None);
    assert_eq!(groups::get_role(&db, ben, joined.id).unwrap(), Some(Role::Owner));
    assert_eq!(groups::get_role(&db, ana, joined.id).unwrap(), None);
}
