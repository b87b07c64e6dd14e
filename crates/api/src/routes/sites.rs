//! Site routes

use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use devfaq_shared::SiteRole;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{tokens, AuthUser},
    error::{ApiError, ApiResult},
    forms::{FormErrors, FormSuccess},
    sites::{
        self,
        validators::{self, SUBDOMAIN_EXISTS_MESSAGE},
        NewSite,
    },
    state::AppState,
};

pub const LOGIN_URL: &str = "/accounts/login";
pub const USER_CP_URL: &str = "/user_cp";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Raw multipart fields of the create-site form
#[derive(Debug, Default)]
struct CreateSiteFields {
    subdomain: String,
    description: String,
    logo: Option<Vec<u8>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContributorRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ContributorResponse {
    pub result: &'static str,
    pub subdomain: String,
    pub username: String,
    pub role: SiteRole,
}

// =============================================================================
// Helpers
// =============================================================================

async fn read_create_site_fields(multipart: &mut Multipart) -> ApiResult<CreateSiteFields> {
    let mut fields = CreateSiteFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("subdomain") => {
                fields.subdomain = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?
                    .trim()
                    .to_string();
            }
            Some("description") => {
                fields.description = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            }
            Some("logo") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                // An empty file input submits a nameless, empty part
                if !bytes.is_empty() {
                    fields.logo = Some(bytes.to_vec());
                }
            }
            _ => {}
        }
    }

    Ok(fields)
}

/// Require a signed-in user who owns `subdomain`, which must exist
async fn require_owner(
    state: &AppState,
    user: Option<Extension<AuthUser>>,
    subdomain: &str,
) -> ApiResult<AuthUser> {
    let Some(Extension(user)) = user else {
        return Err(ApiError::Unauthorized);
    };
    if sites::find_site(&state.pool, subdomain).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    if !sites::user_has_role(&state.pool, user.user_id, subdomain, SiteRole::Owner).await? {
        tracing::warn!(
            user_id = %user.user_id,
            subdomain = %subdomain,
            "Rejected site management by non-owner"
        );
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a site from the multipart create-site form
pub async fn create_site(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let Some(Extension(user)) = user else {
        return Ok(Redirect::to(LOGIN_URL).into_response());
    };
    if !tokens::is_validated(&state.pool, user.user_id).await? {
        return Ok(Redirect::to(USER_CP_URL).into_response());
    }

    let fields = read_create_site_fields(&mut multipart).await?;

    let mut errors = FormErrors::new();
    validators::check_subdomain(&fields.subdomain, &mut errors);
    validators::check_description(&fields.description, &mut errors);
    let logo = fields
        .logo
        .and_then(|bytes| validators::check_logo(bytes, state.config.logo_max_bytes, &mut errors));

    if !errors.has("subdomain") && sites::subdomain_exists(&state.pool, &fields.subdomain).await? {
        errors.add("subdomain", SUBDOMAIN_EXISTS_MESSAGE);
    }
    errors.into_result()?;

    let site = sites::create_site(
        &state.pool,
        &state.logo_storage,
        user.user_id,
        NewSite {
            subdomain: fields.subdomain,
            description: fields.description,
            logo,
        },
    )
    .await?;

    tracing::info!(subdomain = %site.subdomain, user_id = %user.user_id, "create_site: Success");
    Ok(Json(FormSuccess::redirect(USER_CP_URL)).into_response())
}

/// Delete a site (owner only)
pub async fn delete_site(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(subdomain): Path<String>,
) -> ApiResult<StatusCode> {
    require_owner(&state, user, &subdomain).await?;
    sites::delete_site(&state.pool, &subdomain).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant the contributor role (owner only)
pub async fn add_contributor(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(subdomain): Path<String>,
    Form(req): Form<ContributorRequest>,
) -> ApiResult<Json<ContributorResponse>> {
    let username = req.username.trim();
    if username.is_empty() {
        let mut errors = FormErrors::new();
        errors.add("username", validators::REQUIRED_MESSAGE);
        return Err(errors.into());
    }

    require_owner(&state, user, &subdomain).await?;
    sites::add_contributor(&state.pool, &subdomain, username).await?;

    Ok(Json(ContributorResponse {
        result: "success",
        subdomain,
        username: username.to_string(),
        role: SiteRole::Contributor,
    }))
}

/// Revoke the contributor role (owner only)
pub async fn remove_contributor(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path((subdomain, username)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    require_owner(&state, user, &subdomain).await?;
    sites::remove_contributor(&state.pool, &subdomain, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::post, Router};
    use tower::ServiceExt;

    async fn echo_fields(mut multipart: Multipart) -> ApiResult<String> {
        let fields = read_create_site_fields(&mut multipart).await?;
        Ok(format!(
            "{}|{}|{}",
            fields.subdomain,
            fields.description,
            fields.logo.map_or(0, |logo| logo.len())
        ))
    }

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }

    async fn post_fields(parts: &[(&str, Option<&str>, &[u8])]) -> String {
        let boundary = "devfaq-boundary";
        let app = Router::new().route("/", post(echo_fields));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(multipart_body(boundary, parts)))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_reads_form_fields() {
        let body = post_fields(&[
            ("subdomain", None, b" acme "),
            ("description", None, b"FAQ for acme"),
            ("logo", Some("acme.png"), b"1234"),
            ("ignored", None, b"x"),
        ])
        .await;
        assert_eq!(body, "acme|FAQ for acme|4");
    }

    #[tokio::test]
    async fn test_empty_logo_is_absent() {
        let body = post_fields(&[
            ("subdomain", None, b"acme"),
            ("description", None, b"FAQ"),
            ("logo", Some(""), b""),
        ])
        .await;
        assert_eq!(body, "acme|FAQ|0");
    }
}
