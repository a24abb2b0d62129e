//! UserService RPCs
//!
//! All of these sit behind the RPC gate, so a `Caller` is always present.

use crate::api::{error::ApiError, AppState};
use crate::auth::models::{CreateUserRequest, DeleteUserRequest, UpdateUserRequest, UserResponse};
use crate::middleware::Caller;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub status: bool,
    pub message: String,
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub status: bool,
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

/// List users - POST /UserService/GetAllUsers
pub async fn get_all_users(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.users.list_users().await?;
    Ok(Json(UsersResponse {
        status: true,
        message: format!("{} users", users.len()),
        users,
    }))
}

/// Create user - POST /UserService/CreateUser
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = state.users.create_user(payload).await?;
    info!("👤 User {} created by {}", user.email, caller.user_id());
    Ok(Json(UserEnvelope {
        status: true,
        message: "user created".to_string(),
        user,
    }))
}

/// Rename the caller - POST /UserService/UpdateUser
pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = state.users.update_user(caller.user_id(), payload).await?;
    Ok(Json(UserEnvelope {
        status: true,
        message: "user updated".to_string(),
        user,
    }))
}

/// Delete user - POST /UserService/DeleteUser
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<DeleteUserRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.users.delete_user(payload.user_id).await?;
    info!("🗑️  User {} deleted by {}", payload.user_id, caller.user_id());
    Ok(Json(StatusResponse {
        status: true,
        message: "user deleted".to_string(),
    }))
}
