//! Tenant sites
//!
//! Creating a site inserts the site row, creates its permission pair, grants
//! the creator ownership and stores the resized logo, all inside one
//! transaction. Any failure leaves neither rows nor logo files behind.

pub mod logo;
pub mod permissions;
pub mod validators;

use devfaq_shared::{PluginContent, PluginContentRow, Site, SiteRole};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::ApiError;
use crate::forms::FormErrors;
use logo::{LogoError, ResizeBounds};
use permissions::{PermissionError, PgPermissionStore, TenantPermissionSet};
use validators::{LogoUpload, SUBDOMAIN_EXISTS_MESSAGE};

pub use logo::resize_logo;

/// Validated input for a new site
#[derive(Debug, Clone)]
pub struct NewSite {
    pub subdomain: String,
    pub description: String,
    pub logo: Option<LogoUpload>,
}

/// Where and how logos are stored
#[derive(Debug, Clone)]
pub struct LogoStorage {
    pub dir: PathBuf,
    pub bounds: ResizeBounds,
}

impl LogoStorage {
    pub fn new(dir: impl Into<PathBuf>, bounds: ResizeBounds) -> Self {
        Self {
            dir: dir.into(),
            bounds,
        }
    }

    /// Name of the resized logo for a site
    pub fn resized_name(subdomain: &str) -> String {
        format!("{}.png", subdomain)
    }

    /// Write the upload and resize it, returning the final path. On any
    /// failure both the upload and the resized file are removed.
    async fn store(&self, subdomain: &str, upload: &LogoUpload) -> Result<PathBuf, SiteError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stored = self.write_and_resize(subdomain, upload).await;
        if stored.is_err() {
            self.discard(subdomain, upload).await;
        }
        stored
    }

    async fn write_and_resize(&self, subdomain: &str, upload: &LogoUpload) -> Result<PathBuf, SiteError> {
        let uploaded = self.dir.join(upload.file_name(subdomain));
        tokio::fs::write(&uploaded, &upload.bytes).await?;

        let new_name = Self::resized_name(subdomain);
        let bounds = self.bounds;
        let resized = tokio::task::spawn_blocking(move || {
            resize_logo(&uploaded, Some(&new_name), bounds)
        })
        .await
        .map_err(|e| SiteError::Task(e.to_string()))??;

        Ok(resized)
    }

    /// Remove every file a failed store may have left
    async fn discard(&self, subdomain: &str, upload: &LogoUpload) {
        for name in [upload.file_name(subdomain), Self::resized_name(subdomain)] {
            remove_file_if_exists(&self.dir.join(name)).await;
        }
    }
}

async fn remove_file_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed logo file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to remove logo file"),
    }
}

/// Create a site owned by `creator`
pub async fn create_site(
    pool: &PgPool,
    storage: &LogoStorage,
    creator: Uuid,
    new_site: NewSite,
) -> Result<Site, SiteError> {
    let mut tx = pool.begin().await?;

    let mut site: Site = sqlx::query_as(
        r#"
        INSERT INTO sites (subdomain, description, created_by)
        VALUES ($1, $2, $3)
        RETURNING id, subdomain, description, logo_path, live, created_by, created_at
        "#,
    )
    .bind(&new_site.subdomain)
    .bind(&new_site.description)
    .bind(creator)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => SiteError::SubdomainTaken,
        _ => SiteError::Database(e),
    })?;

    {
        let mut permissions = TenantPermissionSet::new(PgPermissionStore::new(&mut *tx));
        permissions.create(&site.subdomain).await?;
        permissions
            .grant(creator, &site.subdomain, &[SiteRole::Owner])
            .await?;
    }

    if let Some(upload) = &new_site.logo {
        let path = storage.store(&site.subdomain, upload).await?;
        let logo_path = path.to_string_lossy().into_owned();

        let updated = sqlx::query("UPDATE sites SET logo_path = $1 WHERE id = $2")
            .bind(&logo_path)
            .bind(site.id)
            .execute(&mut *tx)
            .await;
        if let Err(e) = updated {
            storage.discard(&site.subdomain, upload).await;
            return Err(e.into());
        }
        site.logo_path = Some(logo_path);
    }

    if let Err(e) = tx.commit().await {
        if let Some(upload) = &new_site.logo {
            storage.discard(&site.subdomain, upload).await;
        }
        return Err(e.into());
    }

    tracing::info!(
        site_id = %site.id,
        subdomain = %site.subdomain,
        created_by = %creator,
        has_logo = site.logo_path.is_some(),
        "Site created"
    );

    Ok(site)
}

/// Whether any site already uses `subdomain`
pub async fn subdomain_exists(pool: &PgPool, subdomain: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sites WHERE subdomain = $1)")
        .bind(subdomain)
        .fetch_one(pool)
        .await
}

pub async fn find_site(pool: &PgPool, subdomain: &str) -> Result<Option<Site>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, subdomain, description, logo_path, live, created_by, created_at
        FROM sites
        WHERE subdomain = $1
        "#,
    )
    .bind(subdomain)
    .fetch_optional(pool)
    .await
}

/// Delete a site with its content, permission pair and logo
pub async fn delete_site(pool: &PgPool, subdomain: &str) -> Result<(), SiteError> {
    let mut tx = pool.begin().await?;

    // Plugin content goes with the site via ON DELETE CASCADE
    let logo_path: Option<Option<String>> =
        sqlx::query_scalar("DELETE FROM sites WHERE subdomain = $1 RETURNING logo_path")
            .bind(subdomain)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(logo_path) = logo_path else {
        return Err(SiteError::NotFound);
    };

    TenantPermissionSet::new(PgPermissionStore::new(&mut *tx))
        .delete(subdomain)
        .await?;

    tx.commit().await?;

    if let Some(path) = logo_path {
        remove_file_if_exists(Path::new(&path)).await;
    }

    tracing::info!(subdomain = %subdomain, "Site deleted");
    Ok(())
}

async fn user_id_by_username(pool: &PgPool, username: &str) -> Result<Uuid, SiteError> {
    sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SiteError::UnknownUser(username.to_string()))
}

/// Grant the contributor role on `subdomain` to `username`
pub async fn add_contributor(pool: &PgPool, subdomain: &str, username: &str) -> Result<Uuid, SiteError> {
    let user_id = user_id_by_username(pool, username).await?;
    let mut conn = pool.acquire().await?;
    TenantPermissionSet::new(PgPermissionStore::new(&mut *conn))
        .grant(user_id, subdomain, &[SiteRole::Contributor])
        .await?;
    Ok(user_id)
}

/// Revoke the contributor role on `subdomain` from `username`
pub async fn remove_contributor(pool: &PgPool, subdomain: &str, username: &str) -> Result<Uuid, SiteError> {
    let user_id = user_id_by_username(pool, username).await?;
    let mut conn = pool.acquire().await?;
    TenantPermissionSet::new(PgPermissionStore::new(&mut *conn))
        .revoke(user_id, subdomain, &[SiteRole::Contributor])
        .await?;
    Ok(user_id)
}

/// Whether `user_id` holds `role` on `subdomain`
pub async fn user_has_role(
    pool: &PgPool,
    user_id: Uuid,
    subdomain: &str,
    role: SiteRole,
) -> Result<bool, PermissionError> {
    let mut conn = pool.acquire().await?;
    TenantPermissionSet::new(PgPermissionStore::new(&mut *conn))
        .has_role(user_id, subdomain, role)
        .await
}

/// Every `(subdomain, role)` the user holds
pub async fn user_roles(pool: &PgPool, user_id: Uuid) -> Result<Vec<(String, SiteRole)>, PermissionError> {
    let mut conn = pool.acquire().await?;
    TenantPermissionSet::new(PgPermissionStore::new(&mut *conn))
        .user_roles(user_id)
        .await
}

/// Subdomains the user holds any role on
pub async fn user_sites(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>, PermissionError> {
    let mut conn = pool.acquire().await?;
    TenantPermissionSet::new(PgPermissionStore::new(&mut *conn))
        .user_sites(user_id)
        .await
}

/// Published (non-draft) plugin content of a site, newest first
pub async fn published_content(pool: &PgPool, site_id: Uuid) -> Result<Vec<PluginContent>, sqlx::Error> {
    let rows: Vec<PluginContentRow> = sqlx::query_as(
        r#"
        SELECT id, site_id, author_id, plugin, content, draft, published_at
        FROM plugin_content
        WHERE site_id = $1 AND NOT draft
        ORDER BY published_at DESC
        "#,
    )
    .bind(site_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            PluginContent::try_from(row)
                .map_err(|e| tracing::warn!(content_id = %id, error = %e, "Skipping unknown plugin content"))
                .ok()
        })
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Subdomain already exists")]
    SubdomainTaken,
    #[error("Site not found")]
    NotFound,
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),
    #[error("Logo error: {0}")]
    Logo(#[from] LogoError),
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<SiteError> for ApiError {
    fn from(err: SiteError) -> Self {
        match err {
            SiteError::SubdomainTaken => {
                let mut errors = FormErrors::new();
                errors.add("subdomain", SUBDOMAIN_EXISTS_MESSAGE);
                ApiError::Form(errors)
            }
            SiteError::NotFound => ApiError::NotFound,
            SiteError::UnknownUser(_) => {
                let mut errors = FormErrors::new();
                errors.add("username", "User does not exist");
                ApiError::Form(errors)
            }
            SiteError::Permission(e) => e.into(),
            SiteError::Logo(LogoError::Image(e)) => {
                tracing::warn!(error = %e, "Logo could not be resized");
                let mut errors = FormErrors::new();
                errors.add("logo", validators::INVALID_IMAGE_MESSAGE);
                ApiError::Form(errors)
            }
            SiteError::Logo(LogoError::Io(e)) | SiteError::Io(e) => {
                tracing::error!(error = %e, "Logo storage failed");
                ApiError::Internal
            }
            SiteError::Task(msg) => {
                tracing::error!(error = %msg, "Logo resize task failed");
                ApiError::Internal
            }
            SiteError::Database(e) => e.into(),
        }
    }
}
