//! Site context and user control panel

use axum::{
    extract::{Extension, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use devfaq_shared::{PluginContent, Site, SiteRole};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    auth::{tokens, AuthUser},
    error::ApiResult,
    routing::HostDetails,
    sites,
    state::AppState,
};

use super::sites::LOGIN_URL;

#[derive(Debug, Serialize)]
pub struct SitePage {
    #[serde(flatten)]
    pub site: Site,
    pub content: Vec<PluginContent>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub subdomain: String,
    pub canonical_url: String,
    pub site: Option<SitePage>,
    pub user_sites: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SiteRoles {
    pub subdomain: String,
    pub roles: Vec<SiteRole>,
}

#[derive(Debug, Serialize)]
pub struct UserCpResponse {
    pub username: String,
    pub email: String,
    pub is_validated: bool,
    pub sites: Vec<SiteRoles>,
}

/// Group `(subdomain, role)` pairs by subdomain
pub fn group_roles(pairs: Vec<(String, SiteRole)>) -> Vec<SiteRoles> {
    let mut grouped: BTreeMap<String, Vec<SiteRole>> = BTreeMap::new();
    for (subdomain, role) in pairs {
        grouped.entry(subdomain).or_default().push(role);
    }
    grouped
        .into_iter()
        .map(|(subdomain, mut roles)| {
            roles.sort();
            roles.dedup();
            SiteRoles { subdomain, roles }
        })
        .collect()
}

/// Tenant context for the requested host
pub async fn index(
    State(state): State<AppState>,
    Extension(host): Extension<HostDetails>,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<Json<IndexResponse>> {
    let site = if host.has_subdomain() {
        match sites::find_site(&state.pool, &host.subdomain).await? {
            Some(site) if site.live => {
                let content = sites::published_content(&state.pool, site.id).await?;
                Some(SitePage { site, content })
            }
            _ => None,
        }
    } else {
        None
    };

    let user_sites = match user {
        Some(Extension(user)) => sites::user_sites(&state.pool, user.user_id).await?,
        None => Vec::new(),
    };

    Ok(Json(IndexResponse {
        subdomain: host.subdomain,
        canonical_url: host.canonical_url,
        site,
        user_sites,
    }))
}

/// The signed-in user's account and site roles
pub async fn user_cp(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<Response> {
    let Some(Extension(user)) = user else {
        return Ok(Redirect::to(LOGIN_URL).into_response());
    };

    let is_validated = tokens::is_validated(&state.pool, user.user_id).await?;
    let roles = sites::user_roles(&state.pool, user.user_id).await?;

    Ok(Json(UserCpResponse {
        username: user.username,
        email: user.email,
        is_validated,
        sites: group_roles(roles),
    })
    .into_response())
}
