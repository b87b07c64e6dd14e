//! Per-site permissions
//!
//! Every site owns a permission pair, one record per [`SiteRole`], keyed by
//! `(subdomain, role)`. Users are granted roles by associating them with those
//! records. Granting a role whose record does not exist is silently skipped,
//! as is deleting a pair that was never created.

use devfaq_shared::SiteRole;
use sqlx::PgConnection;
use std::future::Future;
use uuid::Uuid;

/// Storage for permission records and user grants
pub trait PermissionStore: Send {
    /// Insert a permission record; fails with `Duplicate` if it exists
    fn insert_permission(
        &mut self,
        subdomain: &str,
        role: SiteRole,
        name: &str,
    ) -> impl Future<Output = Result<(), PermissionError>> + Send;

    fn permission_exists(
        &mut self,
        subdomain: &str,
        role: SiteRole,
    ) -> impl Future<Output = Result<bool, PermissionError>> + Send;

    /// Delete every permission record (and grant) for a subdomain.
    /// Returns the number of records removed.
    fn delete_permissions(
        &mut self,
        subdomain: &str,
    ) -> impl Future<Output = Result<u64, PermissionError>> + Send;

    /// Associate a user with an existing permission record (idempotent)
    fn add_user_permission(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        role: SiteRole,
    ) -> impl Future<Output = Result<(), PermissionError>> + Send;

    fn remove_user_permission(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        role: SiteRole,
    ) -> impl Future<Output = Result<(), PermissionError>> + Send;

    /// All `(subdomain, role)` pairs held by a user, ordered by subdomain
    fn user_permissions(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<(String, SiteRole)>, PermissionError>> + Send;
}

/// Permission pair lifecycle and grants for sites
pub struct TenantPermissionSet<S> {
    store: S,
}

impl<S: PermissionStore> TenantPermissionSet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Create the owner and contributor records for a new site
    pub async fn create(&mut self, subdomain: &str) -> Result<(), PermissionError> {
        for role in SiteRole::ALL {
            if self.store.permission_exists(subdomain, role).await? {
                return Err(PermissionError::Duplicate(role.codename(subdomain)));
            }
        }

        for role in SiteRole::ALL {
            self.store
                .insert_permission(subdomain, role, &role.display_name(subdomain))
                .await?;
        }

        tracing::info!(subdomain = %subdomain, "Site permissions created");
        Ok(())
    }

    /// Remove both records for a site, along with every grant of them
    pub async fn delete(&mut self, subdomain: &str) -> Result<(), PermissionError> {
        let removed = self.store.delete_permissions(subdomain).await?;
        tracing::info!(subdomain = %subdomain, removed, "Site permissions deleted");
        Ok(())
    }

    /// Grant `roles` on `subdomain` to a user. Roles without a permission
    /// record are skipped.
    pub async fn grant(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        roles: &[SiteRole],
    ) -> Result<(), PermissionError> {
        for &role in roles {
            if !self.store.permission_exists(subdomain, role).await? {
                tracing::debug!(
                    user_id = %user_id,
                    codename = %role.codename(subdomain),
                    "Permission missing, grant skipped"
                );
                continue;
            }
            self.store
                .add_user_permission(user_id, subdomain, role)
                .await?;
            tracing::info!(user_id = %user_id, subdomain = %subdomain, role = %role, "Site role granted");
        }
        Ok(())
    }

    /// Revoke `roles` on `subdomain` from a user. Unheld roles are ignored.
    pub async fn revoke(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        roles: &[SiteRole],
    ) -> Result<(), PermissionError> {
        for &role in roles {
            if !self.store.permission_exists(subdomain, role).await? {
                continue;
            }
            self.store
                .remove_user_permission(user_id, subdomain, role)
                .await?;
            tracing::info!(user_id = %user_id, subdomain = %subdomain, role = %role, "Site role revoked");
        }
        Ok(())
    }

    /// Roles a user holds on one site
    pub async fn roles_for(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
    ) -> Result<Vec<SiteRole>, PermissionError> {
        Ok(self
            .store
            .user_permissions(user_id)
            .await?
            .into_iter()
            .filter(|(site, _)| site == subdomain)
            .map(|(_, role)| role)
            .collect())
    }

    pub async fn has_role(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        role: SiteRole,
    ) -> Result<bool, PermissionError> {
        Ok(self.roles_for(user_id, subdomain).await?.contains(&role))
    }

    /// Every `(subdomain, role)` the user holds, ordered by subdomain
    pub async fn user_roles(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<(String, SiteRole)>, PermissionError> {
        self.store.user_permissions(user_id).await
    }

    /// Subdomains the user holds any role on, deduplicated
    pub async fn user_sites(&mut self, user_id: Uuid) -> Result<Vec<String>, PermissionError> {
        let mut sites: Vec<String> = self
            .user_roles(user_id)
            .await?
            .into_iter()
            .map(|(site, _)| site)
            .collect();
        sites.sort();
        sites.dedup();
        Ok(sites)
    }
}

// =============================================================================
// PostgreSQL store
// =============================================================================

/// Permission store over a single connection, usually a transaction
pub struct PgPermissionStore<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgPermissionStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

impl PermissionStore for PgPermissionStore<'_> {
    async fn insert_permission(
        &mut self,
        subdomain: &str,
        role: SiteRole,
        name: &str,
    ) -> Result<(), PermissionError> {
        sqlx::query("INSERT INTO site_permissions (subdomain, role, name) VALUES ($1, $2, $3)")
            .bind(subdomain)
            .bind(role.as_str())
            .bind(name)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    PermissionError::Duplicate(role.codename(subdomain))
                }
                _ => PermissionError::Database(e),
            })?;
        Ok(())
    }

    async fn permission_exists(
        &mut self,
        subdomain: &str,
        role: SiteRole,
    ) -> Result<bool, PermissionError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM site_permissions WHERE subdomain = $1 AND role = $2)",
        )
        .bind(subdomain)
        .bind(role.as_str())
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(exists)
    }

    async fn delete_permissions(&mut self, subdomain: &str) -> Result<u64, PermissionError> {
        // Grants go with the records via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM site_permissions WHERE subdomain = $1")
            .bind(subdomain)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn add_user_permission(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        role: SiteRole,
    ) -> Result<(), PermissionError> {
        sqlx::query(
            r#"
            INSERT INTO user_site_permissions (user_id, subdomain, role)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(subdomain)
        .bind(role.as_str())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn remove_user_permission(
        &mut self,
        user_id: Uuid,
        subdomain: &str,
        role: SiteRole,
    ) -> Result<(), PermissionError> {
        sqlx::query(
            "DELETE FROM user_site_permissions WHERE user_id = $1 AND subdomain = $2 AND role = $3",
        )
        .bind(user_id)
        .bind(subdomain)
        .bind(role.as_str())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn user_permissions(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<(String, SiteRole)>, PermissionError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT subdomain, role FROM user_site_permissions WHERE user_id = $1 ORDER BY subdomain, role",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter()
            .map(|(subdomain, role)| {
                let role = role
                    .parse()
                    .map_err(|_| PermissionError::UnknownRole(role.clone()))?;
                Ok((subdomain, role))
            })
            .collect()
    }
}

/// Errors that can occur while managing site permissions
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Permission already exists: {0}")]
    Duplicate(String),

    #[error("Unknown role stored: {0}")]
    UnknownRole(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<PermissionError> for crate::error::ApiError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Duplicate(codename) => {
                tracing::warn!(codename = %codename, "Duplicate site permission");
                crate::error::ApiError::Conflict(format!("Permission already exists: {}", codename))
            }
            PermissionError::UnknownRole(role) => {
                tracing::error!(role = %role, "Unknown site role in database");
                crate::error::ApiError::Internal
            }
            PermissionError::Database(e) => e.into(),
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod memory {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    /// Permission store backed by in-process collections
    #[derive(Debug, Default)]
    pub struct MemoryPermissionStore {
        pub permissions: HashMap<(String, SiteRole), String>,
        pub grants: BTreeSet<(Uuid, String, SiteRole)>,
    }

    impl PermissionStore for MemoryPermissionStore {
        async fn insert_permission(
            &mut self,
            subdomain: &str,
            role: SiteRole,
            name: &str,
        ) -> Result<(), PermissionError> {
            let key = (subdomain.to_string(), role);
            if self.permissions.contains_key(&key) {
                return Err(PermissionError::Duplicate(role.codename(subdomain)));
            }
            self.permissions.insert(key, name.to_string());
            Ok(())
        }

        async fn permission_exists(
            &mut self,
            subdomain: &str,
            role: SiteRole,
        ) -> Result<bool, PermissionError> {
            Ok(self
                .permissions
                .contains_key(&(subdomain.to_string(), role)))
        }

        async fn delete_permissions(&mut self, subdomain: &str) -> Result<u64, PermissionError> {
            let before = self.permissions.len();
            self.permissions.retain(|(site, _), _| site != subdomain);
            self.grants.retain(|(_, site, _)| site != subdomain);
            Ok((before - self.permissions.len()) as u64)
        }

        async fn add_user_permission(
            &mut self,
            user_id: Uuid,
            subdomain: &str,
            role: SiteRole,
        ) -> Result<(), PermissionError> {
            self.grants.insert((user_id, subdomain.to_string(), role));
            Ok(())
        }

        async fn remove_user_permission(
            &mut self,
            user_id: Uuid,
            subdomain: &str,
            role: SiteRole,
        ) -> Result<(), PermissionError> {
            self.grants.remove(&(user_id, subdomain.to_string(), role));
            Ok(())
        }

        async fn user_permissions(
            &mut self,
            user_id: Uuid,
        ) -> Result<Vec<(String, SiteRole)>, PermissionError> {
            Ok(self
                .grants
                .iter()
                .filter(|(user, _, _)| *user == user_id)
                .map(|(_, site, role)| (site.clone(), *role))
                .collect())
        }
    }
}
