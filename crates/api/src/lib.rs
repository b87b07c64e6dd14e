//! devfaq API library
//!
//! Multi-tenant website builder: accounts, sites addressed by subdomain, and
//! per-site owner/contributor permissions.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod forms;
pub mod routes;
pub mod routing;
pub mod security;
pub mod sites;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routing::{AllowList, HostDetails};
pub use state::AppState;
