//! Authentication Models
//! Mission: Define identities, claims, credentials and role rights

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier owned by the user store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub i64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which credential a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered claim fields shared by both token kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBody {
    pub user_id: UserId,
    /// issued at (unix seconds)
    pub iat: i64,
    /// expires at (unix seconds), always > iat
    pub exp: i64,
    pub iss: String,
}

/// Signed claim payload.
///
/// The `kind` discriminant is serialized next to the registered claims, e.g.
/// `{"kind":"refresh","user_id":42,"iat":..,"exp":..,"iss":".."}`. A payload
/// without a recognised `kind` does not deserialize at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Claim {
    Access(ClaimBody),
    Refresh(ClaimBody),
}

impl Claim {
    pub fn new(kind: TokenKind, body: ClaimBody) -> Self {
        match kind {
            TokenKind::Access => Claim::Access(body),
            TokenKind::Refresh => Claim::Refresh(body),
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Claim::Access(_) => TokenKind::Access,
            Claim::Refresh(_) => TokenKind::Refresh,
        }
    }

    pub fn body(&self) -> &ClaimBody {
        match self {
            Claim::Access(body) | Claim::Refresh(body) => body,
        }
    }

    pub fn subject(&self) -> UserId {
        self.body().user_id
    }

    pub fn expires_at(&self) -> i64 {
        self.body().exp
    }
}

/// Access + refresh token pair, issued together for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token
    pub expires_at: DateTime<Utc>,
}

/// Permission bits of a role for one (section, route)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRight {
    pub section: String,
    pub route: String,
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl RoleRight {
    /// All four permission bits set
    pub fn full(section: &str, route: &str) -> Self {
        Self {
            section: section.to_string(),
            route: route.to_string(),
            can_create: true,
            can_read: true,
            can_update: true,
            can_delete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Ordered as the store returns them
    pub rights: Vec<RoleRight>,
}

/// User account with its role resolved
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub last_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the user store
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: RoleId,
}

/// Canonical form used for lookups and as the session cache key
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login / renew response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub status: bool,
    pub message: String,
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenResponse {
    pub fn from_pair(pair: CredentialPair, message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            user_id: pair.user_id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RenewTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: RoleId,
}

/// Renames the calling user
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: UserId,
}

/// User response (sanitized)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role_id: RoleId,
    pub role_name: String,
    pub last_access: Option<String>,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role_id: user.role.id,
            role_name: user.role.name.clone(),
            last_access: user
                .last_access
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}
