//! Auth and User Services
//! Mission: Orchestrate login, token renewal and user management over the collaborators

use crate::auth::{
    clock::Clock,
    error::TokenError,
    models::{
        normalize_email, CreateUserRequest, CredentialPair, NewUser, UpdateUserRequest, UserId,
        UserResponse,
    },
    password::PasswordHasher,
    session_cache::SessionCacheGate,
    tokens::{self, TokenIssuer, TokenValidator},
    user_store::UserStore,
};
use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Same error for an unknown email and a wrong password
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid refresh token: {0}")]
    InvalidRefreshToken(TokenError),

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(msg) => ServiceError::Internal(anyhow::anyhow!(msg)),
            other => ServiceError::InvalidRefreshToken(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub pair: CredentialPair,
    /// A live pair was served from the session cache instead of being re-issued
    pub from_cache: bool,
}

pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    sessions: SessionCacheGate,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        issuer: TokenIssuer,
        validator: TokenValidator,
        sessions: SessionCacheGate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            validator,
            sessions,
            clock,
        }
    }

    /// Verify credentials, then reuse a live cached pair or issue a fresh one.
    ///
    /// The session cache is only consulted after the password checks out, and
    /// no cache failure can fail the login.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        info!("🔐 Login attempt: {}", email);

        let Some(mut user) = self.store.find_user_by_email(&email).await? else {
            warn!(target: "security", reason = "unknown_email", "❌ Failed login attempt: {}", email);
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(&self.hasher, password, &user.password_hash).await? {
            warn!(target: "security", reason = "bad_password", user_id = %user.id, "❌ Failed login attempt: {}", email);
            return Err(ServiceError::InvalidCredentials);
        }

        let outcome = match self.sessions.lookup(&email).await {
            Some(pair) if pair.user_id == user.id => LoginOutcome {
                pair,
                from_cache: true,
            },
            _ => {
                let pair = self.issuer.issue(user.id)?;
                if let Err(e) = self.sessions.store(&email, &pair).await {
                    warn!(error = %e, "CacheUnavailable on store, continuing without session cache");
                }
                LoginOutcome {
                    pair,
                    from_cache: false,
                }
            }
        };

        // Best effort; a failed write does not undo a verified login
        user.last_access = Some(self.clock.now());
        if let Err(e) = self.store.update_user(&user).await {
            warn!("Failed to record last access for user {}: {:#}", user.id, e);
        }

        info!(
            "✅ Login successful: {} ({}){}",
            user.email,
            user.role.name,
            if outcome.from_cache { " [cached]" } else { "" }
        );

        Ok(outcome)
    }

    /// Exchange a refresh token for a brand new pair
    pub async fn renew_token(&self, refresh_token: &str) -> Result<CredentialPair, ServiceError> {
        match tokens::renew(&self.validator, &self.issuer, refresh_token) {
            Ok(pair) => {
                info!("🔄 Renewed credentials for user {}", pair.user_id);
                Ok(pair)
            }
            Err(e) => {
                warn!(target: "security", reason = e.code(), "Refresh token rejected");
                Err(e.into())
            }
        }
    }
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, ServiceError> {
        let users = self.store.list_users().await?;
        Ok(users.iter().map(UserResponse::from_user).collect())
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        let email = normalize_email(&req.email);
        let name = req.name.trim().to_string();

        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(ServiceError::InvalidInput("invalid email".to_string()));
        }
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::UserAlreadyExists);
        }
        if !self.store.role_exists(req.role_id).await? {
            return Err(ServiceError::InvalidInput(format!(
                "unknown role {}",
                req.role_id
            )));
        }

        let password_hash = hash_password(&self.hasher, req.password).await?;
        let user = self
            .store
            .create_user(NewUser {
                name,
                email,
                password_hash,
                role_id: req.role_id,
            })
            .await?;

        Ok(UserResponse::from_user(&user))
    }

    /// Rename the caller
    pub async fn update_user(
        &self,
        caller: UserId,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name is required".to_string()));
        }

        let mut user = self
            .store
            .find_user_by_id(caller)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        user.name = name.to_string();
        self.store.update_user(&user).await?;

        Ok(UserResponse::from_user(&user))
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
        if self.store.delete_user(id).await? {
            Ok(())
        } else {
            Err(ServiceError::UserNotFound)
        }
    }
}

/// bcrypt work stays off the runtime workers
async fn verify_password(
    hasher: &Arc<dyn PasswordHasher>,
    password: &str,
    digest: &str,
) -> anyhow::Result<bool> {
    let hasher = hasher.clone();
    let (password, digest) = (password.to_string(), digest.to_string());
    tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
        .await
        .context("password verification task panicked")
}

async fn hash_password(hasher: &Arc<dyn PasswordHasher>, password: String) -> anyhow::Result<String> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("password hashing task panicked")?
}
