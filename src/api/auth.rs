//! AuthService RPCs
//! Mission: Public login and token renewal endpoints

use crate::api::{error::ApiError, AppState};
use crate::auth::models::{LoginRequest, RenewTokenRequest, TokenResponse};
use axum::{extract::State, Json};

/// Login - POST /AuthService/Login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let outcome = state.auth.login(&payload.email, &payload.password).await?;
    let message = if outcome.from_cache {
        "login successful (existing session)"
    } else {
        "login successful"
    };
    Ok(Json(TokenResponse::from_pair(outcome.pair, message)))
}

/// Renew credentials - POST /AuthService/RenewToken
pub async fn renew_token(
    State(state): State<AppState>,
    Json(payload): Json<RenewTokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state.auth.renew_token(&payload.refresh_token).await?;
    Ok(Json(TokenResponse::from_pair(pair, "token renewed")))
}
