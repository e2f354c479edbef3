//! CORS middleware configuration.

use axum::http::header::{
    ACCEPT, ACCEPT_RANGES, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, RANGE,
};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use super::access::ACCESS_TOKEN_HEADER;

/// Create a CORS layer from configuration.
///
/// Media players read the range headers of `/stream` responses, so those are
/// always exposed.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::HEAD, Method::POST, Method::OPTIONS];
    let exposed = [CONTENT_RANGE, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_DISPOSITION];

    let parsed_origins: Vec<HeaderValue> =
        origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        // Development mode: any origin, no credentials
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .expose_headers(exposed)
            .allow_origin(Any)
    } else {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                ACCEPT,
                RANGE,
                HeaderName::from_static(ACCESS_TOKEN_HEADER),
            ])
            .expose_headers(exposed)
            .allow_credentials(true)
            .allow_origin(parsed_origins)
    }
}
