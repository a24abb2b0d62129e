//! Authentication error taxonomy
//!
//! Reason codes here are for logs and audit. The HTTP boundary collapses them
//! into "unauthenticated" / "access denied" before anything reaches a caller.

use crate::auth::models::TokenKind;
use thiserror::Error;

/// Failure to produce or accept a signed token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    MalformedToken,

    #[error("token signature invalid")]
    SignatureInvalid,

    #[error("token expired")]
    Expired,

    #[error("wrong token kind: expected {expected}, got {found}")]
    WrongKind {
        expected: TokenKind,
        found: TokenKind,
    },

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Stable reason code for structured logs
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::MalformedToken => "malformed_token",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Expired => "expired",
            TokenError::WrongKind { .. } => "wrong_kind",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

/// Why the RBAC decision procedure refused a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("identity not found")]
    IdentityNotFound,

    #[error("no rights for route")]
    NoRightsForRoute,

    #[error("unsupported method")]
    UnsupportedMethod,

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::IdentityNotFound => "identity_not_found",
            DenyReason::NoRightsForRoute => "no_rights_for_route",
            DenyReason::UnsupportedMethod => "unsupported_method",
            DenyReason::MethodNotAllowed => "method_not_allowed",
        }
    }
}

/// Terminal outcome of the request interceptor when a call is refused
#[derive(Debug, Error)]
pub enum GateDenial {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] TokenError),

    #[error("missing section header")]
    MissingSection,

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("access denied: {0}")]
    Forbidden(DenyReason),

    /// Store failure or deadline exceeded while authorizing
    #[error("authorization unavailable: {0}")]
    Unavailable(String),
}

impl GateDenial {
    pub fn code(&self) -> &'static str {
        match self {
            GateDenial::MissingCredential => "missing_credential",
            GateDenial::InvalidCredential(e) => e.code(),
            GateDenial::MissingSection => "missing_section",
            GateDenial::InvalidRoute(_) => "invalid_route",
            GateDenial::Forbidden(reason) => reason.code(),
            GateDenial::Unavailable(_) => "unavailable",
        }
    }
}

/// Cache collaborator failure; never surfaced to callers
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cached value corrupt: {0}")]
    Corrupt(String),
}
