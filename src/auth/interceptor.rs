//! Request Interceptor
//! Mission: Gate every RPC before dispatch
//!
//! Each inbound call moves through
//! `Unauthenticated -> TokenExtracted -> IdentityResolved -> RouteAuthorized -> Dispatched`,
//! with every phase a typed value so a later phase cannot run without the
//! earlier one having succeeded. Public methods skip straight to dispatch.
//! Nothing here retries; any failure is terminal for the call.

use crate::auth::{
    error::GateDenial,
    models::UserId,
    rbac::{Decision, RbacDecider},
    route_map::{RouteMap, RouteMapError, RouteMapping},
    tokens::TokenValidator,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const SECTION_HEADER: &str = "x-link-service";

pub const LOGIN: &str = "/AuthService/Login";
pub const RENEW_TOKEN: &str = "/AuthService/RenewToken";

/// What the interceptor needs to know about an inbound call
#[derive(Debug, Clone, Copy)]
pub struct CallMetadata<'a> {
    /// RPC method identifier, e.g. `/UserService/GetAllUsers`
    pub method: &'a str,
    pub authorization: Option<&'a str>,
    pub section: Option<&'a str>,
}

/// Identity and route of an admitted, protected call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub section: String,
    pub route: RouteMapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Unauthenticated endpoint, no identity attached
    Public,
    Authorized(AuthContext),
}

struct TokenExtracted<'a> {
    token: &'a str,
}

struct IdentityResolved {
    user_id: UserId,
}

pub struct Interceptor {
    validator: TokenValidator,
    routes: Arc<RouteMap>,
    rbac: RbacDecider,
    public_methods: HashSet<String>,
    deadline: Duration,
}

impl Interceptor {
    /// `deadline` bounds the RBAC store read; exceeding it denies the call
    pub fn new(
        validator: TokenValidator,
        routes: Arc<RouteMap>,
        rbac: RbacDecider,
        deadline: Duration,
    ) -> Self {
        Self {
            validator,
            routes,
            rbac,
            public_methods: [LOGIN, RENEW_TOKEN].iter().map(|m| m.to_string()).collect(),
            deadline,
        }
    }

    pub fn with_public_method(mut self, method: impl Into<String>) -> Self {
        self.public_methods.insert(method.into());
        self
    }

    pub fn is_public(&self, method: &str) -> bool {
        self.public_methods.contains(method)
    }

    pub async fn admit(&self, call: &CallMetadata<'_>) -> Result<Admission, GateDenial> {
        if self.is_public(call.method) {
            debug!("Public method {}, skipping authentication", call.method);
            return Ok(Admission::Public);
        }

        let extracted = Self::extract_token(call).map_err(|d| Self::deny(call, None, d))?;
        let identity = self
            .resolve_identity(extracted)
            .map_err(|d| Self::deny(call, None, d))?;
        let user_id = identity.user_id;
        let context = self
            .authorize_route(identity, call)
            .await
            .map_err(|d| Self::deny(call, Some(user_id), d))?;

        debug!(
            "Admitted {} for user {} ({} {} in {})",
            call.method, context.user_id, context.route.verb, context.route.path, context.section
        );
        Ok(Admission::Authorized(context))
    }

    fn extract_token<'a>(call: &CallMetadata<'a>) -> Result<TokenExtracted<'a>, GateDenial> {
        let raw = call.authorization.ok_or(GateDenial::MissingCredential)?;
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if token.is_empty() {
            return Err(GateDenial::MissingCredential);
        }
        Ok(TokenExtracted { token })
    }

    fn resolve_identity(&self, extracted: TokenExtracted<'_>) -> Result<IdentityResolved, GateDenial> {
        let user_id = self.validator.validate_access(extracted.token)?;
        Ok(IdentityResolved { user_id })
    }

    async fn authorize_route(
        &self,
        identity: IdentityResolved,
        call: &CallMetadata<'_>,
    ) -> Result<AuthContext, GateDenial> {
        let section = call
            .section
            .filter(|s| !s.is_empty())
            .ok_or(GateDenial::MissingSection)?;

        let route = self
            .routes
            .map_method(call.method)
            .map_err(|RouteMapError::InvalidRoute(method)| GateDenial::InvalidRoute(method))?;

        let decision = tokio::time::timeout(
            self.deadline,
            self.rbac
                .authorize(identity.user_id, section, &route.path, &route.verb),
        )
        .await
        .map_err(|_| GateDenial::Unavailable("deadline exceeded".to_string()))?
        .map_err(|e| GateDenial::Unavailable(format!("{:#}", e)))?;

        match decision {
            Decision::Allow => Ok(AuthContext {
                user_id: identity.user_id,
                section: section.to_string(),
                route: route.clone(),
            }),
            Decision::Deny(reason) => Err(GateDenial::Forbidden(reason)),
        }
    }

    fn deny(call: &CallMetadata<'_>, user_id: Option<UserId>, denial: GateDenial) -> GateDenial {
        let user = user_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        match &denial {
            GateDenial::Unavailable(detail) => error!(
                target: "security",
                reason = denial.code(),
                method = call.method,
                user = %user,
                "Authorization unavailable: {}",
                detail
            ),
            _ => warn!(
                target: "security",
                reason = denial.code(),
                method = call.method,
                user = %user,
                "Call denied"
            ),
        }
        denial
    }
}
