//! HTTP API for the key exchange service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::db::Database;
use crate::exchange::KeyExchangeCoordinator;
use crate::registry::DeviceRegistry;
use crate::secrets::SecretStore;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Shared application state.
///
/// Every component wraps the same connection pool; nothing else is shared
/// between requests.
#[derive(Clone)]
pub struct AppState {
    /// Device registry
    pub registry: DeviceRegistry,
    /// Shared-secret store
    pub secrets: SecretStore,
    /// Key exchange coordinator
    pub coordinator: KeyExchangeCoordinator,
}

impl AppState {
    /// Create new application state over a connection pool.
    pub fn new(db: Database) -> Self {
        let registry = DeviceRegistry::new(db.clone());
        let secrets = SecretStore::new(db);
        let coordinator = KeyExchangeCoordinator::new(registry.clone(), secrets.clone());

        Self {
            registry,
            secrets,
            coordinator,
        }
    }
}

/// Create the API router with the given rate limiter.
pub fn create_router(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Device registry
        .route("/api/devices", post(handlers::register_device))
        .route("/api/devices/find", post(handlers::find_device))
        // Key exchange
        .route("/api/exchange-keys", post(handlers::exchange_keys))
        // Shared secrets
        .route("/api/secrets", post(handlers::store_secret))
        .route(
            "/api/secrets/by-identifiers",
            post(handlers::secret_by_identifiers),
        )
        .route("/api/secrets/by-phones", post(handlers::secret_by_phones))
        .route("/api/secrets/check", post(handlers::check_secret))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
