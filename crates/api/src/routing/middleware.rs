//! Host resolution middleware
//!
//! Rejects requests whose scheme is not http(s) or whose host is not covered
//! by the allow-list, then resolves the host and stores the resulting
//! [`HostDetails`] as a request extension for handlers.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::host_resolver::AllowList;
use crate::error::ApiError;

/// State for the host middleware
#[derive(Clone)]
pub struct HostState {
    pub allow_list: Arc<AllowList>,
    /// Scheme used when no `X-Forwarded-Proto` header is present
    pub default_scheme: String,
}

/// Scheme of the original request, as reported by a fronting proxy
fn request_scheme<'a>(request: &'a Request<Body>, default: &'a str) -> &'a str {
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

/// Host of the request: `Host` header first, then the URI authority
fn request_host(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .filter(|host| !host.is_empty())
}

/// Schemes a request may be served over
const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];

/// Middleware attaching [`HostDetails`](super::HostDetails) to every request
pub async fn resolve_host(
    State(state): State<HostState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let scheme = request_scheme(&request, &state.default_scheme).to_string();
    let host = request_host(&request);

    if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
        tracing::warn!(scheme = %scheme, "Rejected unsupported scheme");
        return ApiError::BadRequest(format!("Unsupported scheme: {}", scheme)).into_response();
    }
    if let Some(host) = host.as_deref() {
        if !state.allow_list.permits(host) {
            tracing::warn!(host = %host, "Rejected host outside ALLOWED_HOSTS");
            return ApiError::BadRequest(format!("Invalid host: {}", host)).into_response();
        }
    }

    let details = match state.allow_list.resolve(&scheme, host.as_deref()) {
        Ok(details) => details,
        Err(e) => {
            tracing::warn!(host = ?host, error = %e, "Rejected malformed host");
            return ApiError::BadRequest(e.to_string()).into_response();
        }
    };

    tracing::debug!(
        subdomain = %details.subdomain,
        hostname = %details.hostname,
        port = details.port,
        "Host resolved"
    );

    request.extensions_mut().insert(details);
    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::routing::HostDetails;
    use axum::{http::StatusCode, routing::get, Extension, Json, Router};
    use tower::ServiceExt;

    async fn echo(Extension(details): Extension<HostDetails>) -> Json<HostDetails> {
        Json(details)
    }

    fn app() -> Router {
        let state = HostState {
            allow_list: Arc::new(AllowList::new([".dev-faq.com"])),
            default_scheme: "https".to_string(),
        };
        Router::new()
            .route("/", get(echo))
            .layer(axum::middleware::from_fn_with_state(state, resolve_host))
    }

    async fn details(response: Response) -> HostDetails {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_site_subdomain() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "python.dev-faq.com")
                    .header("x-forwarded-proto", "http")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let details = details(response).await;
        assert_eq!(details.subdomain, "python");
        assert_eq!(details.hostname, "dev-faq.com");
        assert_eq!(details.port, 80);
        assert_eq!(details.canonical_url, "http://python.dev-faq.com");
    }

    #[tokio::test]
    async fn test_default_scheme_and_port() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "dev-faq.com:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let details = details(response).await;
        assert_eq!(details.scheme, "https");
        assert_eq!(details.subdomain, "");
        assert_eq!(details.canonical_url, "https://dev-faq.com:8080");
    }

    #[tokio::test]
    async fn test_falls_back_to_uri_authority() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("http://rust.dev-faq.com/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let details = details(response).await;
        assert_eq!(details.subdomain, "rust");
    }

    #[tokio::test]
    async fn test_missing_host() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let details = details(response).await;
        assert_eq!(details, HostDetails::without_host("https"));
    }

    #[tokio::test]
    async fn test_malformed_port_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "dev-faq.com:abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_foreign_host_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_forwarded_scheme_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "python.dev-faq.com")
                    .header("x-forwarded-proto", "javascript")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
