use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use hyper::StatusCode;
use serde_json::json;

use crate::error::{Result, TunnelError};

type RespBody = BoxBody<Bytes, hyper::Error>;

fn json_response(status: StatusCode, body: serde_json::Value) -> Result<Response<RespBody>> {
    let body_bytes = serde_json::to_vec(&body)
        .map_err(|e| TunnelError::Metrics(format!("failed to serialize response: {e}")))?;

    let body = Full::new(Bytes::from(body_bytes)).map_err(|never| match never {}).boxed();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body)
        .map_err(|e| TunnelError::Metrics(format!("failed to build response: {e}")))
}

/// Health check response - always returns 200 if the process is running.
pub fn health_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, json!({"status": "healthy"}))
}

/// Readiness check - returns 200 once the tunnel has at least one active
/// session, 503 otherwise (spec §10 "Readiness tracks data-plane state, not
/// process liveness").
pub fn ready_check_response(active_sessions: u64) -> Result<Response<RespBody>> {
    if active_sessions == 0 {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"status": "not_ready", "reason": "no_active_sessions"}),
        )
    } else {
        json_response(StatusCode::OK, json!({"status": "ready", "active_sessions": active_sessions}))
    }
}

/// Liveness check - always returns 200 if the process is running.
pub fn live_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, json!({"status": "alive"}))
}
