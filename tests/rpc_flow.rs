//! End-to-end RPC flows through the gate
//!
//! Drives the full router (logging, gate, handlers) against an in-memory
//! SQLite store with a manually advanced clock.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tablelink_auth::{
    api::{rpc_router, AppState},
    auth::{
        clock::ManualClock,
        error::CacheError,
        models::RoleRight,
        password::{BcryptHasher, PasswordHasher},
        route_map::RouteMap,
        session_cache::{InMemorySessionCache, SessionCache, SessionCacheGate},
        tokens::TokenLifetimes,
        AuthService, ClaimCodec, Interceptor, RbacDecider, SqliteUserStore, TokenIssuer,
        TokenValidator, UserService,
    },
};
use tower::ServiceExt;

const SECRET: &[u8] = b"integration-test-secret-at-least-32-bytes";
const ADMIN_EMAIL: &str = "admin@tablelink.test";
const ADMIN_PASSWORD: &str = "admin-password";
const EDITOR_EMAIL: &str = "editor@tablelink.test";
const EDITOR_PASSWORD: &str = "editor-password";

struct BrokenCache;

#[async_trait]
impl SessionCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: String,
        _ttl: std::time::Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

struct TestApp {
    app: Router,
    clock: Arc<ManualClock>,
}

async fn setup(cache: Option<Arc<dyn SessionCache>>) -> TestApp {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ));
    let codec = Arc::new(ClaimCodec::new(SECRET, "tablelink_user", clock.clone()));
    let lifetimes = TokenLifetimes::default();
    let issuer = TokenIssuer::new(codec.clone(), lifetimes);
    let validator = TokenValidator::new(codec);
    let routes = Arc::new(RouteMap::reference());

    let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(4));
    let store = Arc::new(SqliteUserStore::new(":memory:").unwrap());
    store
        .ensure_default_admin(
            ADMIN_EMAIL,
            &hasher.hash(ADMIN_PASSWORD).unwrap(),
            "admin",
            &routes.paths(),
        )
        .unwrap();

    let editor = store.create_role("editor").unwrap();
    store
        .grant_right(
            editor,
            &RoleRight {
                section: "admin".to_string(),
                route: "/users/user".to_string(),
                can_create: true,
                can_read: false,
                can_update: true,
                can_delete: false,
            },
        )
        .unwrap();

    let users = UserService::new(store.clone(), hasher.clone());
    users
        .create_user(tablelink_auth::auth::models::CreateUserRequest {
            name: "Editor".to_string(),
            email: EDITOR_EMAIL.to_string(),
            password: EDITOR_PASSWORD.to_string(),
            role_id: editor,
        })
        .await
        .unwrap();

    let sessions = SessionCacheGate::new(
        cache,
        validator.clone(),
        clock.clone(),
        Duration::hours(4),
        lifetimes.access,
        std::time::Duration::from_millis(200),
    );

    let state = AppState {
        auth: Arc::new(AuthService::new(
            store.clone(),
            hasher,
            issuer,
            validator.clone(),
            sessions,
            clock.clone(),
        )),
        users: Arc::new(users),
        interceptor: Arc::new(Interceptor::new(
            validator,
            routes,
            RbacDecider::new(store),
            std::time::Duration::from_secs(1),
        )),
    };

    TestApp {
        app: rpc_router(state),
        clock,
    }
}

async fn rpc(
    app: &Router,
    method: &str,
    token: Option<&str>,
    section: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(method)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(section) = section {
        builder = builder.header("x-link-service", section);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = rpc(
        app,
        "/AuthService/Login",
        None,
        None,
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

fn token<'a>(body: &'a Value, field: &str) -> &'a str {
    body[field].as_str().unwrap()
}

#[tokio::test]
async fn test_admin_login_and_list_users() {
    let t = setup(None).await;
    let session = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(session["status"], true);

    let (status, body) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some(token(&session, "access_token")),
        Some("admin"),
        json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    // password hashes never leave the service
    assert!(!body.to_string().contains("password"));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let t = setup(None).await;

    let (wrong_status, wrong_body) = rpc(
        &t.app,
        "/AuthService/Login",
        None,
        None,
        json!({ "email": ADMIN_EMAIL, "password": "nope" }),
    )
    .await;
    let (unknown_status, unknown_body) = rpc(
        &t.app,
        "/AuthService/Login",
        None,
        None,
        json!({ "email": "ghost@tablelink.test", "password": "nope" }),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["status"], false);
}

#[tokio::test]
async fn test_editor_rights_are_enforced() {
    let t = setup(None).await;
    let session = login(&t.app, EDITOR_EMAIL, EDITOR_PASSWORD).await;
    let access = token(&session, "access_token");

    let (status, body) = rpc(
        &t.app,
        "/UserService/CreateUser",
        Some(access),
        Some("admin"),
        json!({
            "name": "New Hire",
            "email": "new@tablelink.test",
            "password": "new-hire-password",
            "role_id": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["email"], "new@tablelink.test");

    let (status, body) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some(access),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "access denied");

    let (status, _) = rpc(
        &t.app,
        "/UserService/CreateUser",
        Some(access),
        Some("billing"),
        json!({
            "name": "Other",
            "email": "other@tablelink.test",
            "password": "other-password",
            "role_id": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_gate_rejections() {
    let t = setup(None).await;
    let session = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let access = token(&session, "access_token");
    let refresh = token(&session, "refresh_token");

    // no credential
    let (status, body) = rpc(&t.app, "/UserService/GetAllUsers", None, Some("admin"), json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthenticated");

    // refresh token presented as an access token
    let (status, _) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some(refresh),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // forged token
    let (status, _) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some("eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl"),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // missing section
    let (status, _) = rpc(&t.app, "/UserService/GetAllUsers", Some(access), None, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // unknown method is denied, not 404'd
    let (status, body) = rpc(
        &t.app,
        "/UserService/DropAllUsers",
        Some(access),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "access denied");
}

#[tokio::test]
async fn test_expired_access_then_renew() {
    let t = setup(None).await;
    let session = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    t.clock.advance(Duration::hours(4) + Duration::seconds(1));

    let (status, _) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some(token(&session, "access_token")),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // an access token cannot renew
    let (status, _) = rpc(
        &t.app,
        "/AuthService/RenewToken",
        None,
        None,
        json!({ "refresh_token": token(&session, "access_token") }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, renewed) = rpc(
        &t.app,
        "/AuthService/RenewToken",
        None,
        None,
        json!({ "refresh_token": token(&session, "refresh_token") }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renewed["user_id"], session["user_id"]);

    let (status, _) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some(token(&renewed, "access_token")),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_repeat_login_served_from_session_cache() {
    let t = setup(Some(Arc::new(InMemorySessionCache::new()))).await;
    let first = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    t.clock.advance(Duration::minutes(30));
    let second = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    assert_eq!(second["access_token"], first["access_token"]);
    assert_eq!(second["message"], "login successful (existing session)");
}

#[tokio::test]
async fn test_broken_session_cache_never_blocks_login() {
    let t = setup(Some(Arc::new(BrokenCache))).await;
    let session = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = rpc(
        &t.app,
        "/UserService/GetAllUsers",
        Some(token(&session, "access_token")),
        Some("admin"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_management_rpcs() {
    let t = setup(None).await;
    let session = login(&t.app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let access = token(&session, "access_token");

    let create = json!({
        "name": "Dup",
        "email": EDITOR_EMAIL,
        "password": "some-password",
        "role_id": 1
    });
    let (status, _) = rpc(&t.app, "/UserService/CreateUser", Some(access), Some("admin"), create).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let unknown_role = json!({
        "name": "Nobody",
        "email": "nobody@example.com",
        "password": "some-password",
        "role_id": 4242
    });
    let (status, body) =
        rpc(&t.app, "/UserService/CreateUser", Some(access), Some("admin"), unknown_role).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);

    let (status, body) = rpc(
        &t.app,
        "/UserService/UpdateUser",
        Some(access),
        Some("admin"),
        json!({ "name": "Root" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Root");
    assert_eq!(body["user"]["user_id"], session["user_id"]);

    let (status, _) = rpc(
        &t.app,
        "/UserService/DeleteUser",
        Some(access),
        Some("admin"),
        json!({ "user_id": 9999 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = rpc(&t.app, "/UserService/GetAllUsers", Some(access), Some("admin"), json!({})).await;
    let editor_id = listed["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == EDITOR_EMAIL)
        .map(|u| u["user_id"].clone())
        .unwrap();

    let (status, body) = rpc(
        &t.app,
        "/UserService/DeleteUser",
        Some(access),
        Some("admin"),
        json!({ "user_id": editor_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
}
