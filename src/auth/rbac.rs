//! RBAC Decision Procedure
//! Mission: Decide allow/deny from a role's rights for one (section, route, verb)

use crate::auth::{
    error::DenyReason,
    models::{Role, RoleRight, UserId},
    user_store::UserStore,
};
use anyhow::Result;
use axum::http::Method;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Resolves the subject's role and applies [`decide`] to it
#[derive(Clone)]
pub struct RbacDecider {
    store: Arc<dyn UserStore>,
}

impl RbacDecider {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Exactly one store read per call. `Err` means the store itself failed,
    /// which is distinct from a subject that does not exist.
    pub async fn authorize(
        &self,
        subject: UserId,
        section: &str,
        route: &str,
        verb: &Method,
    ) -> Result<Decision> {
        let Some(user) = self.store.find_user_by_id(subject).await? else {
            return Ok(Decision::Deny(DenyReason::IdentityNotFound));
        };
        Ok(decide(&user.role, section, route, verb))
    }
}

/// Pure decision over an already-resolved role.
///
/// Matching is exact and case-sensitive. Should a role ever carry two rows
/// for the same (section, route), the first one wins.
pub fn decide(role: &Role, section: &str, route: &str, verb: &Method) -> Decision {
    let Some(right) = role
        .rights
        .iter()
        .find(|r| r.section == section && r.route == route)
    else {
        return Decision::Deny(DenyReason::NoRightsForRoute);
    };

    match permission_for(right, verb) {
        None => Decision::Deny(DenyReason::UnsupportedMethod),
        Some(false) => Decision::Deny(DenyReason::MethodNotAllowed),
        Some(true) => Decision::Allow,
    }
}

fn permission_for(right: &RoleRight, verb: &Method) -> Option<bool> {
    match verb.as_str() {
        "POST" => Some(right.can_create),
        "GET" => Some(right.can_read),
        "PUT" => Some(right.can_update),
        "DELETE" => Some(right.can_delete),
        _ => None,
    }
}
