//! Middleware for the RPC transport.
//!
//! This module provides:
//! - The authentication/authorization gate in front of every RPC
//! - Per-call logging with latency tracking

pub mod logging;
pub mod rpc_gate;

pub use logging::rpc_logging;
pub use rpc_gate::{rpc_gate, Caller};
