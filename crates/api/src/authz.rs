//! API-side authorization guard.
//!
//! Checked at the command boundary, before anything is dispatched, so aggregates
//! and infra stay unaware of roles.

use arkpos_auth::{AuthzError, CommandAuthorization, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

/// Permissions a cashier holds. Admins hold the wildcard.
const CASHIER_PERMISSIONS: &[&str] = &[
    "catalog.read",
    "parties.read",
    "parties.clients.write",
    "sales.checkout",
    "sales.read",
    "inventory.read",
    "reports.cash_cut",
];

/// Check every permission the command requires against the request principal.
pub fn authorize_command<C: CommandAuthorization>(principal: &PrincipalContext, command: &C) -> Result<(), AuthzError> {
    let principal = resolve(principal);
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Same check for routes that only read.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(&resolve(principal), &Permission::new(permission))
}

fn resolve(principal: &PrincipalContext) -> Principal {
    Principal {
        principal_id: principal.user_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    }
}

pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(Role::is_admin) {
        return vec![Permission::all()];
    }

    if roles.iter().any(|r| r.as_str() == Role::cashier().as_str()) {
        return CASHIER_PERMISSIONS.iter().map(|p| Permission::new(*p)).collect();
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::routes::common::CmdAuth;
    use arkpos_auth::UserId;

    fn cashier() -> PrincipalContext {
        PrincipalContext::new(UserId::generate(), "Ana", vec![Role::cashier()])
    }

    #[test]
    fn admin_may_do_anything() {
        let admin = PrincipalContext::new(UserId::generate(), "Root", vec![Role::admin()]);
        let cmd = CmdAuth {
            inner: (),
            required: vec![Permission::new("purchases.write"), Permission::new("users.manage")],
        };
        assert!(authorize_command(&admin, &cmd).is_ok());
    }

    #[test]
    fn cashier_sells_but_does_not_buy() {
        assert!(require(&cashier(), "sales.checkout").is_ok());
        assert!(require(&cashier(), "parties.clients.write").is_ok());
        assert_eq!(
            require(&cashier(), "purchases.write"),
            Err(AuthzError::Forbidden("purchases.write".to_string()))
        );
        assert!(require(&cashier(), "sales.void").is_err());
    }

    #[test]
    fn unknown_roles_get_nothing() {
        let guest = PrincipalContext::new(UserId::generate(), "Guest", vec![Role::new("guest")]);
        assert!(require(&guest, "catalog.read").is_err());
    }
}
