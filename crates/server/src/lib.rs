//! COA Bridge server library.
//!
//! Shopify app backend that installs into a shop via OAuth and serves the
//! shop's certificate-of-analysis metaobjects as a sorted JSON list.
//!
//! Exposed as a library so the CLI and integration tests can reuse the
//! configuration, database and collector.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod shopify;
pub mod state;

use axum::{Router, middleware as axum_middleware};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
///
/// Sessions are only attached to the install routes; the API and health
/// checks never touch the session store.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());
    let cors_layer = middleware::create_cors_layer(&state.config().cors_origins);

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::auth_routes().layer(session_layer))
        .merge(routes::api_routes().layer(cors_layer))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
