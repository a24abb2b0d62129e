//! TableLink Auth Library
//!
//! Token lifecycle, session cache, route mapping and RBAC for the RPC backend,
//! plus the axum transport that binds them together.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
