//! Authentication middleware
//!
//! Bearer tokens are optional on every route. A valid token attaches an
//! [`AuthUser`] extension; handlers decide what an anonymous request may do.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::jwt::JwtManager;

/// State for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
}

/// Authenticated user attached to the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Attach an [`AuthUser`] when the request carries a valid bearer token
pub async fn optional_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&request) {
        match state.jwt_manager.validate_token(token) {
            Ok(claims) => {
                request.extensions_mut().insert(AuthUser {
                    user_id: claims.sub,
                    username: claims.username,
                    email: claims.email,
                });
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid bearer token");
            }
        }
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{routing::get, Extension, Router};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    async fn whoami(user: Option<Extension<AuthUser>>) -> String {
        user.map(|Extension(user)| user.username)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app() -> Router {
        let state = AuthState {
            jwt_manager: JwtManager::new(SECRET, 24),
        };
        Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn_with_state(state, optional_auth))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_attaches_user() {
        let token = JwtManager::new(SECRET, 24)
            .generate_access_token(Uuid::new_v4(), "ada", "ada@example.com")
            .unwrap();

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "ada");
    }

    #[tokio::test]
    async fn test_missing_or_invalid_token_is_anonymous() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "anonymous");

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("authorization", "Bearer garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "anonymous");
    }
}
