//! Transactional email
//!
//! Sends account emails via the Resend API. Delivery failure is reported to
//! the caller. Without an API key every send fails with
//! [`EmailError::NotConfigured`] unless log-only mode is switched on.

use crate::config::Config;

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key
    pub resend_api_key: String,
    /// Resend API base URL
    pub api_url: String,
    /// Default sender address
    pub email_from: String,
    /// Site name for branding
    pub site_name: String,
    /// Log instead of failing when no API key is set
    pub log_only: bool,
}

impl EmailConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resend_api_key: config.resend_api_key.clone(),
            api_url: config.resend_api_url.trim_end_matches('/').to_string(),
            email_from: config.email_from.clone(),
            site_name: config.site_name.clone(),
            log_only: config.email_log_only,
        }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

/// Mail transport for site emails
#[derive(Clone)]
pub struct SiteMailer {
    config: EmailConfig,
    client: reqwest::Client,
}

impl SiteMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    /// Send a plain text email
    pub async fn send_site_email(
        &self,
        sender: &str,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), EmailError> {
        if !self.config.is_enabled() {
            if self.config.log_only {
                tracing::info!(to = %recipient, subject = %subject, body = %body, "Email logged (EMAIL_LOG_ONLY)");
                return Ok(());
            }
            tracing::error!(to = %recipient, subject = %subject, "Email not configured");
            return Err(EmailError::NotConfigured);
        }

        let payload = serde_json::json!({
            "from": sender,
            "to": [recipient],
            "subject": subject,
            "text": body,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.config.api_url))
            .header("Authorization", format!("Bearer {}", self.config.resend_api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, to = %recipient, "Failed to send email");
                EmailError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, to = %recipient, "Email rejected");
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %recipient, subject = %subject, "Email sent");
        Ok(())
    }

    /// Send the registration email containing the validation link
    pub async fn send_registration(
        &self,
        recipient: &str,
        username: &str,
        canonical_url: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let subject = registration_subject(&self.config.site_name);
        let body = registration_body(&self.config.site_name, username, canonical_url, token);
        self.send_site_email(&self.config.email_from, recipient, &subject, &body)
            .await
    }
}

pub fn registration_subject(site_name: &str) -> String {
    format!("Thank you for registering with {}", site_name)
}

/// Link that validates the account holding `token`
pub fn validation_url(canonical_url: &str, token: &str) -> String {
    format!("{}/validate?token={}", canonical_url, token)
}

pub fn registration_body(site_name: &str, username: &str, canonical_url: &str, token: &str) -> String {
    format!(
        "Hi {username},\n\n\
         Thank you for registering with {site_name}.\n\n\
         Please confirm your email address by visiting the link below:\n\n\
         {link}\n\n\
         Once validated you can create your own site.\n\n\
         The {site_name} team\n",
        username = username,
        site_name = site_name,
        link = validation_url(canonical_url, token),
    )
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Email rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Email is not configured: RESEND_API_KEY is empty")]
    NotConfigured,
}

impl From<EmailError> for crate::error::ApiError {
    fn from(err: EmailError) -> Self {
        crate::error::ApiError::Email(err.to_string())
    }
}
