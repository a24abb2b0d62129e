//! RPC surface
//!
//! Every RPC is `POST /<Service>/<Method>` with a JSON body, so the request
//! path is the method identifier the gate and the route map work with.

pub mod auth;
pub mod error;
pub mod users;

use crate::auth::{
    interceptor::{Interceptor, LOGIN, RENEW_TOKEN},
    route_map::{CREATE_USER, DELETE_USER, GET_ALL_USERS, UPDATE_USER},
    service::{AuthService, UserService},
};
use crate::middleware::{rpc_gate, rpc_logging};
use axum::{http::StatusCode, middleware, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub interceptor: Arc<Interceptor>,
}

/// All RPCs behind the gate. Public methods are let through by the
/// interceptor itself; the gate also covers the fallback so unknown methods
/// are denied rather than 404'd.
pub fn rpc_router(state: AppState) -> Router {
    let interceptor = state.interceptor.clone();

    Router::new()
        .route(LOGIN, post(auth::login))
        .route(RENEW_TOKEN, post(auth::renew_token))
        .route(GET_ALL_USERS, post(users::get_all_users))
        .route(CREATE_USER, post(users::create_user))
        .route(UPDATE_USER, post(users::update_user))
        .route(DELETE_USER, post(users::delete_user))
        .fallback(unknown_method)
        .with_state(state)
        .layer(middleware::from_fn_with_state(interceptor, rpc_gate))
        .layer(middleware::from_fn(rpc_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Reached only by a call the gate admitted but no handler serves
async fn unknown_method() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": false, "message": "unknown method" })),
    )
}
