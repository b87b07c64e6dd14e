//! Host-based routing for tenant sites
//!
//! Every request host is classified against the allow-list, giving the site
//! subdomain (if any) the request addresses, e.g.
//! - Site subdomains: python.dev-faq.com
//! - Base domains: dev-faq.com

mod host_resolver;
mod middleware;

pub use host_resolver::{
    canonical_url, resolve, AllowList, HostDetails, HostResolveError, DEFAULT_HTTPS_PORT,
    DEFAULT_HTTP_PORT,
};
pub use middleware::{resolve_host, HostState};
