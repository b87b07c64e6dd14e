//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{AuthState, JwtManager};
use crate::config::Config;
use crate::email::{EmailConfig, SiteMailer};
use crate::routing::{AllowList, HostState};
use crate::sites::LogoStorage;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub allow_list: Arc<AllowList>,
    pub jwt_manager: JwtManager,
    pub mailer: SiteMailer,
    pub logo_storage: Arc<LogoStorage>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let allow_list = AllowList::new(&config.allowed_hosts);
        if allow_list.is_empty() {
            tracing::warn!("ALLOWED_HOSTS is empty, every request with a host will be rejected");
        }
        if config.resend_api_key.is_empty() && !config.email_log_only {
            tracing::warn!("RESEND_API_KEY is empty, registration will fail until it is set (or EMAIL_LOG_ONLY=true)");
        }

        Self {
            pool,
            allow_list: Arc::new(allow_list),
            jwt_manager: JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours),
            mailer: SiteMailer::new(EmailConfig::from_config(&config)),
            logo_storage: Arc::new(LogoStorage::new(&config.logo_dir, config.logo_bounds)),
            config: Arc::new(config),
        }
    }

    /// State for the host resolution middleware
    pub fn host_state(&self) -> HostState {
        HostState {
            allow_list: Arc::clone(&self.allow_list),
            default_scheme: self.config.public_scheme.clone(),
        }
    }

    /// State for the auth middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
        }
    }
}
