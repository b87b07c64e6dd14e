//! Common types used across devfaq

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Sites
// =============================================================================

/// Maximum length of a site subdomain
pub const SUBDOMAIN_MAX_LENGTH: usize = 20;

/// Maximum length of a site description
pub const DESCRIPTION_MAX_LENGTH: usize = 2000;

/// A tenant site, keyed by its unique subdomain
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: Uuid,
    pub subdomain: String,
    pub description: String,
    /// Path of the stored logo, relative to the working directory
    pub logo_path: Option<String>,
    pub live: bool,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Site roles
// =============================================================================

/// Role a user can hold on a site. Owner and contributor are independent
/// grants; a user may hold both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteRole {
    Owner,
    Contributor,
}

impl SiteRole {
    pub const ALL: [SiteRole; 2] = [SiteRole::Owner, SiteRole::Contributor];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteRole::Owner => "owner",
            SiteRole::Contributor => "contributor",
        }
    }

    /// Permission codename for this role on `subdomain`, e.g. `acme_owner`
    pub fn codename(&self, subdomain: &str) -> String {
        format!("{}_{}", subdomain, self.as_str())
    }

    /// Human readable permission name, e.g. `Owner of acme`
    pub fn display_name(&self, subdomain: &str) -> String {
        match self {
            SiteRole::Owner => format!("Owner of {}", subdomain),
            SiteRole::Contributor => format!("Contributor to {}", subdomain),
        }
    }
}

impl fmt::Display for SiteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(SiteRole::Owner),
            "contributor" => Ok(SiteRole::Contributor),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// =============================================================================
// Plugins
// =============================================================================

/// Content plugin types a site can be populated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Article,
    Faq,
    FeaturedFunction,
    FeaturedPackage,
    News,
}

impl PluginKind {
    pub const ALL: [PluginKind; 5] = [
        PluginKind::Article,
        PluginKind::Faq,
        PluginKind::FeaturedFunction,
        PluginKind::FeaturedPackage,
        PluginKind::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Article => "article",
            PluginKind::Faq => "faq",
            PluginKind::FeaturedFunction => "featured_function",
            PluginKind::FeaturedPackage => "featured_package",
            PluginKind::News => "news",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PluginKind::Article => "Article",
            PluginKind::Faq => "FAQ",
            PluginKind::FeaturedFunction => "Featured Function",
            PluginKind::FeaturedPackage => "Featured Package",
            PluginKind::News => "News",
        }
    }
}

impl FromStr for PluginKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Database row for plugin content (plugin stored as TEXT)
#[derive(Debug, Clone, FromRow)]
pub struct PluginContentRow {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Option<Uuid>,
    pub plugin: String,
    pub content: serde_json::Value,
    pub draft: bool,
    pub published_at: OffsetDateTime,
}

/// Plugin content as exposed to clients
#[derive(Debug, Clone, Serialize)]
pub struct PluginContent {
    pub id: Uuid,
    pub author_id: Option<Uuid>,
    pub plugin: PluginKind,
    pub content: serde_json::Value,
    pub draft: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

impl TryFrom<PluginContentRow> for PluginContent {
    type Error = UnknownVariant;

    fn try_from(row: PluginContentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            author_id: row.author_id,
            plugin: row.plugin.parse()?,
            content: row.content,
            draft: row.draft,
            published_at: row.published_at,
        })
    }
}

/// A stored string did not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown variant: {0}")]
pub struct UnknownVariant(pub String);
