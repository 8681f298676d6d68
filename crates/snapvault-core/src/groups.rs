//! Membership & role authority: group lifecycle, invite-code joins, and
//! member administration.

use rand::Rng;
use snapvault_db::Database;
use snapvault_types::api::MemberResponse;
use snapvault_types::error::Result;
use snapvault_types::models::Group;
use snapvault_types::{Error, Role};
use tracing::info;
use uuid::Uuid;

use crate::convert::{group_from_row, parse_role, parse_timestamp, parse_uuid};
use crate::policy::{Action, authorize};
use crate::storage::Storage;

const INVITE_CODE_LEN: usize = 6;
const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Bounded retries against UNIQUE collisions on generated codes.
const INVITE_CODE_ATTEMPTS: usize = 10;

const MIN_GROUP_NAME_CHARS: usize = 2;
const MAX_GROUP_NAME_CHARS: usize = 80;

fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_ALPHABET[rng.random_range(0..INVITE_CODE_ALPHABET.len())] as char)
        .collect()
}

fn validate_group_name(name: &str) -> Result<&str> {
    let name = name.trim();
    let chars = name.chars().count();
    if chars < MIN_GROUP_NAME_CHARS {
        return Err(Error::validation("group name must be at least 2 characters"));
    }
    if chars > MAX_GROUP_NAME_CHARS {
        return Err(Error::validation("group name must be at most 80 characters"));
    }
    Ok(name)
}

/// Create a group owned by `creator_id`. The creator's `owner` membership is
/// written in the same transaction as the group row. Invite codes are
/// regenerated on collision; the UNIQUE constraint is the arbiter, so two
/// concurrent creations can never share a code.
pub fn create_group(
    db: &Database,
    creator_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<Group> {
    let name = validate_group_name(name)?;
    let id = Uuid::new_v4();

    for _ in 0..INVITE_CODE_ATTEMPTS {
        let invite_code = generate_invite_code();
        let inserted = db.create_group(
            &id.to_string(),
            name,
            description,
            &creator_id.to_string(),
            &invite_code,
        )?;
        if inserted {
            info!("Group {} created by {}", id, creator_id);
            return Ok(Group {
                id,
                name: name.to_string(),
                description: description.map(str::to_string),
                creator_id,
                invite_code,
                created_at: chrono::Utc::now(),
            });
        }
    }

    Err(Error::Internal(anyhow::anyhow!(
        "could not generate a unique invite code after {} attempts",
        INVITE_CODE_ATTEMPTS
    )))
}

/// Join a group by invite code. New members start at the lowest role.
/// Duplicate joins (including the owner joining their own group) resolve at
/// the membership primary key.
pub fn join_group(db: &Database, user_id: Uuid, invite_code: &str) -> Result<(Group, Role)> {
    let code = invite_code.trim().to_uppercase();
    let row = db
        .get_group_by_invite_code(&code)?
        .ok_or(Error::NotFound("group"))?;

    let inserted = db.insert_membership(
        &row.id,
        &user_id.to_string(),
        Role::DEFAULT_ON_JOIN.as_str(),
    )?;
    if !inserted {
        return Err(Error::AlreadyMember);
    }

    Ok((group_from_row(row), Role::DEFAULT_ON_JOIN))
}

/// Pure role lookup; no side effects, never cached.
pub fn get_role(db: &Database, user_id: Uuid, group_id: Uuid) -> Result<Option<Role>> {
    let membership = db.get_membership(&group_id.to_string(), &user_id.to_string())?;
    Ok(membership.map(|m| parse_role(&m.role)))
}

pub fn get_group(db: &Database, requester: Uuid, group_id: Uuid) -> Result<Group> {
    let row = db
        .get_group(&group_id.to_string())?
        .ok_or(Error::NotFound("group"))?;
    authorize(db, requester, group_id, Action::ViewGroup)?;
    Ok(group_from_row(row))
}

pub fn list_my_groups(db: &Database, user_id: Uuid) -> Result<Vec<Group>> {
    let rows = db.list_groups_for_user(&user_id.to_string())?;
    Ok(rows.into_iter().map(group_from_row).collect())
}

pub fn list_members(db: &Database, requester: Uuid, group_id: Uuid) -> Result<Vec<MemberResponse>> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, requester, group_id, Action::ListMembers)?;

    let rows = db.list_members(&group_id.to_string())?;
    Ok(rows
        .into_iter()
        .map(|m| MemberResponse {
            user_id: parse_uuid(&m.user_id, "user"),
            name: m.name,
            role: parse_role(&m.role),
            joined_at: parse_timestamp(&m.joined_at),
        })
        .collect())
}

/// Leave a group. Owners cannot leave: they must transfer ownership or
/// delete the group instead.
pub fn leave_group(db: &Database, user_id: Uuid, group_id: Uuid) -> Result<()> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    let role = get_role(db, user_id, group_id)?
        .ok_or_else(|| Error::forbidden("not a member of this group"))?;
    if role == Role::Owner {
        return Err(Error::forbidden("owner cannot leave their own group"));
    }

    db.delete_membership(&group_id.to_string(), &user_id.to_string())?;
    Ok(())
}

/// Delete a group and everything it owns. Memberships and photo records go
/// atomically with the group row; stored bytes are cleaned up best-effort
/// afterwards (a failed file delete leaves an orphan file, never a dangling
/// record).
pub async fn delete_group(
    db: &Database,
    storage: &Storage,
    requester: Uuid,
    group_id: Uuid,
) -> Result<()> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, requester, group_id, Action::DeleteGroup)?;

    let refs = db
        .delete_group(&group_id.to_string())?
        .ok_or(Error::NotFound("group"))?;

    let count = refs.len();
    for reference in refs {
        storage.delete(&reference).await.ok();
    }
    info!(
        "Group {} deleted by {} ({} stored files cleaned up)",
        group_id, requester, count
    );
    Ok(())
}

/// Update group metadata (admin and up). Name changes revalidate like
/// creation.
pub fn update_group(
    db: &Database,
    requester: Uuid,
    group_id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<Group> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, requester, group_id, Action::UpdateGroup)?;

    let name = name.map(validate_group_name).transpose()?;
    db.update_group(&group_id.to_string(), name, description)?;

    let row = db
        .get_group(&group_id.to_string())?
        .ok_or(Error::NotFound("group"))?;
    Ok(group_from_row(row))
}

/// Change another member's role (admin and up). The owner's role and the
/// caller's own role are off-limits, and `owner` can only be granted via
/// ownership transfer.
pub fn set_member_role(
    db: &Database,
    requester: Uuid,
    group_id: Uuid,
    target_user: Uuid,
    new_role: Role,
) -> Result<()> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, requester, group_id, Action::ModerateMembers)?;

    if target_user == requester {
        return Err(Error::validation("cannot change your own access level"));
    }
    if new_role == Role::Owner {
        return Err(Error::validation(
            "ownership is granted via transfer, not role assignment",
        ));
    }

    let current = get_role(db, target_user, group_id)?.ok_or(Error::NotFound("member"))?;
    if current == Role::Owner {
        return Err(Error::forbidden("cannot change the owner's role"));
    }

    db.set_member_role(
        &group_id.to_string(),
        &target_user.to_string(),
        new_role.as_str(),
    )?;
    Ok(())
}

/// Transfer ownership to another existing member. The previous owner drops
/// to the lowest role; both updates commit in one transaction so the group
/// has exactly one owner at every point.
pub fn transfer_ownership(
    db: &Database,
    requester: Uuid,
    group_id: Uuid,
    new_owner: Uuid,
) -> Result<()> {
    if db.get_group(&group_id.to_string())?.is_none() {
        return Err(Error::NotFound("group"));
    }
    authorize(db, requester, group_id, Action::TransferOwnership)?;

    if new_owner == requester {
        return Err(Error::validation("you are already the owner"));
    }
    if get_role(db, new_owner, group_id)?.is_none() {
        return Err(Error::NotFound("member"));
    }

    db.transfer_ownership(
        &group_id.to_string(),
        &requester.to_string(),
        &new_owner.to_string(),
        Role::RestrictedViewer.as_str(),
    )?;
    info!(
        "Ownership of group {} transferred from {} to {}",
        group_id, requester, new_owner
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_codes_are_six_uppercase_alphanumeric() {
        for _ in 0..100 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(
                code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn group_names_shorter_than_two_chars_are_rejected() {
        assert!(validate_group_name("a").is_err());
        assert!(validate_group_name("  a  ").is_err());
        assert!(validate_group_name("ab").is_ok());
        assert!(validate_group_name(&"x".repeat(81)).is_err());
    }
}
