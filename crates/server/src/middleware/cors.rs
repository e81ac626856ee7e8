//! CORS for storefront pages fetching the COA list.

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Create the CORS layer for `/api/*`.
///
/// Only `GET` from the configured origins is allowed. Origins that are not
/// valid header values are skipped with a warning; an empty list allows no
/// cross-origin requests.
#[must_use]
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| tracing::warn!(origin = %origin, error = %e, "Skipping CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}
