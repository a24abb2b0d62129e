//! Authentication Module
//! Mission: Issue and validate credentials, and gate every RPC with per-role rights

pub mod clock;
pub mod error;
pub mod interceptor;
pub mod jwt;
pub mod models;
pub mod password;
pub mod rbac;
pub mod route_map;
pub mod service;
pub mod session_cache;
pub mod tokens;
pub mod user_store;

pub use interceptor::Interceptor;
pub use jwt::ClaimCodec;
pub use rbac::RbacDecider;
pub use route_map::RouteMap;
pub use service::{AuthService, UserService};
pub use tokens::{TokenIssuer, TokenValidator};
pub use user_store::{SqliteUserStore, UserStore};
