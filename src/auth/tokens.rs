//! Token Issuer and Validator
//! Mission: Mint access+refresh pairs and accept only the kind a caller asks for

use crate::auth::{
    error::TokenError,
    jwt::ClaimCodec,
    models::{Claim, ClaimBody, CredentialPair, TokenKind, UserId},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Lifetimes of the two credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(4),
            refresh: Duration::days(30),
        }
    }
}

/// Issues credential pairs
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<ClaimCodec>,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(codec: Arc<ClaimCodec>, lifetimes: TokenLifetimes) -> Self {
        Self { codec, lifetimes }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Issue an access+refresh pair for `subject`.
    ///
    /// Both claims share one `now`; if either encoding fails nothing is returned.
    pub fn issue(&self, subject: UserId) -> Result<CredentialPair, TokenError> {
        let now = self.codec.clock().now();
        let access_expires_at = now + self.lifetimes.access;
        let refresh_expires_at = now + self.lifetimes.refresh;

        let access_token = self.sign(TokenKind::Access, subject, now, access_expires_at)?;
        let refresh_token = self.sign(TokenKind::Refresh, subject, now, refresh_expires_at)?;

        debug!(
            "Issued credential pair for user {}, access expires {}",
            subject, access_expires_at
        );

        Ok(CredentialPair {
            user_id: subject,
            access_token,
            refresh_token,
            expires_at: access_expires_at,
        })
    }

    fn sign(
        &self,
        kind: TokenKind,
        subject: UserId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claim = Claim::new(
            kind,
            ClaimBody {
                user_id: subject,
                iat: issued_at.timestamp(),
                exp: expires_at.timestamp(),
                iss: self.codec.issuer().to_string(),
            },
        );
        self.codec.encode(&claim)
    }
}

/// Validates inbound tokens of a declared kind. Never does I/O.
#[derive(Clone)]
pub struct TokenValidator {
    codec: Arc<ClaimCodec>,
}

impl TokenValidator {
    pub fn new(codec: Arc<ClaimCodec>) -> Self {
        Self { codec }
    }

    pub fn validate_access(&self, token: &str) -> Result<UserId, TokenError> {
        self.validate(token, TokenKind::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<UserId, TokenError> {
        self.validate(token, TokenKind::Refresh)
    }

    /// Full claim of an access token, for callers that need its expiry
    pub fn access_claim(&self, token: &str) -> Result<Claim, TokenError> {
        self.codec.decode(strip_bearer(token), TokenKind::Access)
    }

    fn validate(&self, token: &str, kind: TokenKind) -> Result<UserId, TokenError> {
        self.codec
            .decode(strip_bearer(token), kind)
            .map(|claim| claim.subject())
    }
}

/// Exchange a valid refresh token for a brand new pair
pub fn renew(
    validator: &TokenValidator,
    issuer: &TokenIssuer,
    refresh_token: &str,
) -> Result<CredentialPair, TokenError> {
    let subject = validator.validate_refresh(refresh_token)?;
    issuer.issue(subject)
}

fn strip_bearer(token: &str) -> &str {
    token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim()
}
