//! Request throttling and logging.

use crate::error::ExchangeError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Paths that bypass throttling so probes keep working under load.
const UNTHROTTLED_PATHS: &[&str] = &["/health"];

/// Process-wide limiter shared by every client.
pub type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct RateLimitState {
    pub global: Arc<GlobalLimiter>,
}

impl RateLimitState {
    /// Allow `requests_per_minute` across all clients. Zero is treated as one.
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            global: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    /// Effectively unlimited; for tests.
    pub fn permissive() -> Self {
        Self::new(100_000)
    }
}

/// Reject requests over the global quota with 429.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ExchangeError> {
    if UNTHROTTLED_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    if rate_limit.global.check().is_err() {
        warn!(path = %request.uri().path(), "Global rate limit exceeded");
        return Err(ExchangeError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/// Log each request's outcome and latency. Bodies are never logged since
/// they may carry secret material.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(%method, %path, %status, ?elapsed, "Request failed");
    } else if status.is_client_error() {
        info!(%method, %path, %status, ?elapsed, "Request rejected");
    } else {
        debug!(%method, %path, %status, ?elapsed, "Request completed");
    }

    response
}
