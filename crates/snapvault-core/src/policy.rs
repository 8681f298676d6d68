//! Central authorization policy: one threshold table, one comparison.

use snapvault_db::Database;
use snapvault_types::error::Result;
use snapvault_types::{Error, Role};
use uuid::Uuid;

use crate::groups::get_role;

/// Group-scoped actions gated by the role hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewGroup,
    ListMembers,
    ViewPhotos,
    UploadPhoto,
    TagPhoto,
    UpdateGroup,
    ModerateMembers,
    DeleteOthersPhotos,
    ViewAnalytics,
    DeleteGroup,
    TransferOwnership,
}

impl Action {
    /// Minimum role required. Any role with authority at or above the
    /// threshold is permitted.
    pub fn required_role(self) -> Role {
        match self {
            Action::ViewGroup | Action::ListMembers | Action::ViewPhotos => Role::RestrictedViewer,
            Action::UploadPhoto | Action::TagPhoto => Role::Contributor,
            Action::UpdateGroup
            | Action::ModerateMembers
            | Action::DeleteOthersPhotos
            | Action::ViewAnalytics => Role::Admin,
            Action::DeleteGroup | Action::TransferOwnership => Role::Owner,
        }
    }
}

/// Check a (possibly absent) membership role against an action's threshold.
/// Returns the role so callers can branch on it after the gate.
pub fn authorize_role(role: Option<Role>, action: Action) -> Result<Role> {
    let Some(role) = role else {
        return Err(Error::forbidden("not a member of this group"));
    };
    if role >= action.required_role() {
        Ok(role)
    } else {
        Err(Error::forbidden(format!(
            "requires role {} or higher",
            action.required_role()
        )))
    }
}

/// Authorize `user_id` for `action` in `group_id`. Reads the membership
/// fresh on every call — roles are never cached across requests, so a
/// downgrade takes effect immediately.
pub fn authorize(db: &Database, user_id: Uuid, group_id: Uuid, action: Action) -> Result<Role> {
    let role = get_role(db, user_id, group_id)?;
    authorize_role(role, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 5] = [
        Role::RestrictedViewer,
        Role::Viewer,
        Role::Contributor,
        Role::Admin,
        Role::Owner,
    ];

    const ALL_ACTIONS: [Action; 11] = [
        Action::ViewGroup,
        Action::ListMembers,
        Action::ViewPhotos,
        Action::UploadPhoto,
        Action::TagPhoto,
        Action::UpdateGroup,
        Action::ModerateMembers,
        Action::DeleteOthersPhotos,
        Action::ViewAnalytics,
        Action::DeleteGroup,
        Action::TransferOwnership,
    ];

    #[test]
    fn non_member_is_always_denied() {
        for action in ALL_ACTIONS {
            assert!(authorize_role(None, action).is_err());
        }
    }

    #[test]
    fn authorization_is_monotonic_in_role() {
        // If an action is permitted at role R, it is permitted at every
        // role with authority >= R.
        for action in ALL_ACTIONS {
            for (i, lower) in ALL_ROLES.iter().enumerate() {
                if authorize_role(Some(*lower), action).is_ok() {
                    for higher in &ALL_ROLES[i..] {
                        assert!(
                            authorize_role(Some(*higher), action).is_ok(),
                            "{higher:?} denied an action permitted at {lower:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn thresholds_match_the_policy_table() {
        assert!(authorize_role(Some(Role::RestrictedViewer), Action::ViewPhotos).is_ok());
        assert!(authorize_role(Some(Role::RestrictedViewer), Action::UploadPhoto).is_err());
        assert!(authorize_role(Some(Role::Viewer), Action::UploadPhoto).is_err());
        assert!(authorize_role(Some(Role::Contributor), Action::UploadPhoto).is_ok());
        assert!(authorize_role(Some(Role::Contributor), Action::UpdateGroup).is_err());
        assert!(authorize_role(Some(Role::Admin), Action::ModerateMembers).is_ok());
        assert!(authorize_role(Some(Role::Admin), Action::DeleteGroup).is_err());
        assert!(authorize_role(Some(Role::Owner), Action::DeleteGroup).is_ok());
    }
}
