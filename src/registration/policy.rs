//! Authorization policy for registration operations.
//!
//! Every role-based decision made by the gateway goes through [`can_access`].
//! Citizens see only what they submitted; reviewers and admins see everything
//! and are the only ones allowed to decide on a registration.

use crate::auth::{Principal, Role};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Submit,
    List,
    View,
    UpdateStatus,
}

/// Decide whether `actor` may perform `action` on a resource owned by
/// `resource_owner_id`. `None` means "any registration, owner not known".
#[must_use]
pub fn can_access(actor: &Principal, resource_owner_id: Option<Uuid>, action: Action) -> bool {
    match action {
        Action::Submit => true,
        Action::List | Action::View => {
            actor.role.is_staff() || resource_owner_id == Some(actor.user_id)
        }
        Action::UpdateStatus => matches!(actor.role, Role::Reviewer | Role::Admin),
    }
}
