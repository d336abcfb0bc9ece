use uuid::Uuid;

use super::repo_types::Role;
use crate::auth::extractors::CurrentUser;

/// Ownership rule for per-id operations: admins may target anyone,
/// everyone else only their own record.
pub fn can_access(caller: &CurrentUser, target: Uuid) -> bool {
    caller.role == Role::Admin || caller.id == target
}

/// A role change riding on an update is admin-only. Re-stating the current
/// role is not a change; ownership has already restricted non-admins to
/// their own record, so the caller's role is the target's current role.
pub fn role_change_allowed(caller: &CurrentUser, requested: Role) -> bool {
    caller.role == Role::Admin || requested == caller.role
}
