//! Application configuration

use std::env;
use std::num::NonZeroU32;

use crate::sites::logo::ResizeBounds;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_scheme: String,
    pub allowed_hosts: Vec<String>, // e.g. ".dev-faq.com" for *.dev-faq.com sites

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Email
    pub resend_api_key: String,
    pub resend_api_url: String,
    pub email_from: String,
    pub site_name: String,
    /// Log emails instead of failing when no API key is set (development)
    pub email_log_only: bool,

    // Logos
    pub logo_dir: String,
    pub logo_bounds: ResizeBounds,
    pub logo_max_bytes: usize,

    // Feature flags
    pub enable_signup: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            public_scheme: {
                let scheme = env::var("PUBLIC_SCHEME").unwrap_or_else(|_| "https".to_string());
                if scheme != "http" && scheme != "https" {
                    return Err(ConfigError::Invalid(
                        "PUBLIC_SCHEME must be either http or https",
                    ));
                }
                scheme
            },
            allowed_hosts: parse_list(
                &env::var("ALLOWED_HOSTS").unwrap_or_else(|_| "localhost,127.0.0.1".to_string()),
            ),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Email
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            resend_api_url: env::var("RESEND_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@devfaq.com".to_string()),
            site_name: env::var("SITE_NAME").unwrap_or_else(|_| "devfaq".to_string()),
            email_log_only: env::var("EMAIL_LOG_ONLY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            // Logos
            logo_dir: env::var("LOGO_DIR").unwrap_or_else(|_| "static/logos".to_string()),
            logo_bounds: ResizeBounds {
                max_width: parse_bound("LOGO_MAX_WIDTH", 500)?,
                max_height: parse_bound("LOGO_MAX_HEIGHT", 400)?,
            },
            logo_max_bytes: env::var("LOGO_MAX_BYTES")
                .unwrap_or_else(|_| "5242880".to_string()) // 5MB default
                .parse()
                .unwrap_or(5 * 1024 * 1024),

            // Feature flags
            enable_signup: env::var("ENABLE_SIGNUP")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }
}

/// Split a comma-separated list, dropping blank entries
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a resize bound; `0` means unbounded
fn parse_bound(name: &'static str, default: u32) -> Result<Option<NonZeroU32>, ConfigError> {
    let value: u32 = match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("logo bounds must be non-negative integers"))?,
        Err(_) => default,
    };
    Ok(NonZeroU32::new(value))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
