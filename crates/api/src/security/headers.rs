//! Security headers middleware

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response},
    middleware::Next,
};

use crate::routing::HostDetails;

/// Content policy for tenant pages: same-origin assets plus inline logos
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
     img-src 'self' data:; \
     frame-ancestors 'self'; \
     base-uri 'self'; \
     form-action 'self'";

/// Adds security headers to every response
///
/// `Strict-Transport-Security` is only sent when the resolved request scheme
/// is https, so it must run inside the host resolution layer.
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let is_https = request
        .extensions()
        .get::<HostDetails>()
        .is_some_and(|host| host.scheme == "https");

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );

    if is_https {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    // Handlers may opt into caching
    if !headers.contains_key("Cache-Control") {
        headers.insert(
            "Cache-Control",
            HeaderValue::from_static("no-store, private"),
        );
    }

    response
}
