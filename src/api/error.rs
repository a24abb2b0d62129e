//! RPC boundary errors
//!
//! Internal reason codes stay in the logs; callers only ever see these messages.

use crate::auth::{error::GateDenial, service::ServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    AccessDenied,
    AuthorizationUnavailable,
    InvalidCredentials,
    InvalidInput(String),
    UserNotFound,
    UserAlreadyExists,
    InternalError,
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated".to_string()),
            ApiError::AccessDenied => (StatusCode::FORBIDDEN, "access denied".to_string()),
            ApiError::AuthorizationUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "authorization unavailable".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid email or password".to_string(),
            ),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::UserNotFound => (StatusCode::NOT_FOUND, "user not found".to_string()),
            ApiError::UserAlreadyExists => (StatusCode::CONFLICT, "user already exists".to_string()),
            ApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "status": false, "message": message }))).into_response()
    }
}

impl From<GateDenial> for ApiError {
    fn from(denial: GateDenial) -> Self {
        match denial {
            GateDenial::MissingCredential | GateDenial::InvalidCredential(_) => {
                ApiError::Unauthenticated
            }
            GateDenial::MissingSection | GateDenial::InvalidRoute(_) | GateDenial::Forbidden(_) => {
                ApiError::AccessDenied
            }
            GateDenial::Unavailable(_) => ApiError::AuthorizationUnavailable,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials => ApiError::InvalidCredentials,
            ServiceError::InvalidRefreshToken(_) => ApiError::Unauthenticated,
            ServiceError::UserAlreadyExists => ApiError::UserAlreadyExists,
            ServiceError::UserNotFound => ApiError::UserNotFound,
            ServiceError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            ServiceError::Internal(e) => {
                error!("Internal error: {:#}", e);
                ApiError::InternalError
            }
        }
    }
}
