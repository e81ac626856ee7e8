//! HTTP middleware stack for COA Bridge.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (storefront origins calling `/api/*`)
//! 5. Session layer (tower-sessions with `PostgreSQL` store, OAuth routes only)

pub mod cors;
pub mod request_id;
pub mod session;

pub use cors::create_cors_layer;
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
