//! Request tracking middleware
//!
//! One log line per request plus an append to the analytics event stream.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use stumpcast_common::events::StumpcastEvent;

pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    // Best-effort client address; the service usually sits behind a proxy.
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        method = %method,
        path = %path,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    state.event_bus.emit_lossy(StumpcastEvent::RequestHandled {
        method,
        path,
        status,
        ip,
        user_agent,
        timestamp: chrono::Utc::now(),
    });

    response
}
