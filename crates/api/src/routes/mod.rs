//! HTTP routes

pub mod auth;
pub mod health;
pub mod index;
pub mod sites;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{
    auth::optional_auth, routing::resolve_host, security::security_headers_middleware,
    state::AppState,
};

/// Room for the text fields and multipart framing around a logo upload
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create all routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (outside host resolution for infrastructure probes)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Logo uploads are checked against LOGO_MAX_BYTES in the handler, so the
    // body limit must leave room for an oversize file to reach it
    let create_site_routes = Router::new()
        .route("/create_site", post(sites::create_site))
        .layer(DefaultBodyLimit::max(
            state.config.logo_max_bytes.saturating_mul(2) + MULTIPART_OVERHEAD_BYTES,
        ));

    let site_routes = Router::new()
        .route("/", get(index::index))
        .route("/user_cp", get(index::user_cp))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/login_form", post(auth::login_form))
        .route("/validate", get(auth::validate))
        .route("/sites/:subdomain", delete(sites::delete_site))
        .route("/sites/:subdomain/contributors", post(sites::add_contributor))
        .route(
            "/sites/:subdomain/contributors/:username",
            delete(sites::remove_contributor),
        )
        .merge(create_site_routes)
        .layer(middleware::from_fn_with_state(
            state.auth_state(),
            optional_auth,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn_with_state(
            state.host_state(),
            resolve_host,
        ));

    Router::new()
        .merge(health_routes)
        .merge(site_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
