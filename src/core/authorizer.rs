use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::core::{AppError, AppErrorType};

/// Role that bypasses every gate, including per-transition permission checks.
pub const SUPER_ADMIN: &str = "SuperAdmin";

pub const APPROVE_REQUEST: &str = "approve-request";
pub const MANAGE_USERS: &str = "manage-users";
pub const MANAGE_PORTALS: &str = "manage-portals";

/// Static, per-action role requirement. Parsed once at startup from the same
/// pipe-delimited form the route configuration uses, never per request.
#[derive(Debug, Clone)]
pub struct RoleSet {
    roles: HashSet<String>,
}

impl RoleSet {
    pub fn parse(pipe_delimited: &str) -> Self {
        let roles = pipe_delimited
            .split('|')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect();

        Self { roles }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

pub static PORTAL_ADMIN_ROLES: Lazy<RoleSet> =
    Lazy::new(|| RoleSet::parse("Admin|project-manager"));
pub static USER_ADMIN_ROLES: Lazy<RoleSet> = Lazy::new(|| RoleSet::parse("Admin"));
pub static REVIEWER_ROLES: Lazy<RoleSet> = Lazy::new(|| RoleSet::parse("Admin|project-manager"));

/// Allow when the caller holds `SuperAdmin` or any of the required roles.
/// Unauthenticated callers never reach this point; the JWT extractor rejects
/// them with a 401 first.
pub fn authorize(caller_roles: &[String], required: &RoleSet) -> Result<(), AppError> {
    if is_super_admin(caller_roles) {
        return Ok(());
    }

    if caller_roles.iter().any(|role| required.contains(role)) {
        return Ok(());
    }

    Err(AppError {
        message: Some("You don't have permission to perform this action".to_string()),
        cause: None,
        error_type: AppErrorType::ForbiddenError,
    })
}

pub fn is_super_admin(caller_roles: &[String]) -> bool {
    caller_roles.iter().any(|role| role == SUPER_ADMIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn parse_splits_on_pipes_and_trims_whitespace() {
        let set = RoleSet::parse(" Admin | project-manager ||");
        assert!(set.contains("Admin"));
        assert!(set.contains("project-manager"));
        assert!(!set.contains(""));
    }

    #[test]
    fn caller_with_an_intersecting_role_is_allowed() {
        let required = RoleSet::parse("Admin|project-manager");
        assert_ok!(authorize(&roles(&["project-manager"]), &required));
    }

    #[test]
    fn caller_without_an_intersecting_role_is_denied() {
        let required = RoleSet::parse("Admin|project-manager");
        assert_err!(authorize(&roles(&["requestor"]), &required));
    }

    #[test]
    fn caller_with_no_roles_is_denied() {
        let required = RoleSet::parse("Admin");
        assert_err!(authorize(&[], &required));
    }

    #[test]
    fn super_admin_passes_every_gate() {
        let required = RoleSet::parse("some-role-nobody-holds");
        assert_ok!(authorize(&roles(&[SUPER_ADMIN]), &required));
    }

    #[test]
    fn denial_maps_to_forbidden() {
        let required = RoleSet::parse("Admin");
        let error = authorize(&roles(&["requestor"]), &required).unwrap_err();
        assert_eq!(error.error_type, AppErrorType::ForbiddenError);
    }
}
