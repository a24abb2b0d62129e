//! RPC logging middleware.
//!
//! Logs every call with its method identifier, declared section, status code and latency.

use crate::auth::interceptor::SECTION_HEADER;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Logs at INFO for completed calls and WARN for 5xx.
pub async fn rpc_logging(request: Request<Body>, next: Next) -> Response {
    let rpc_method = request.uri().path().to_string();
    let section = request
        .headers()
        .get(SECTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();

    let span = tracing::info_span!(
        "rpc",
        method = %rpc_method,
        section = %section,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    if status >= 500 {
        warn!(
            method = %rpc_method,
            section = %section,
            status = status,
            latency_ms = latency.as_millis(),
            "RPC failed (5xx)"
        );
    } else {
        info!(
            method = %rpc_method,
            status = status,
            latency_ms = latency.as_millis(),
            "RPC completed"
        );
    }

    response
}
