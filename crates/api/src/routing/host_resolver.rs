//! Host-to-Site Resolution
//!
//! Resolves incoming Host headers against the configured allow-list to find
//! which site subdomain (if any) a request addresses:
//! - Site subdomains: python.dev-faq.com -> subdomain "python" on dev-faq.com
//! - Base domains: dev-faq.com -> no subdomain
//! - Anything else (IP literals, foreign domains): no subdomain, full host kept
//!
//! Resolution is a pure function of its inputs. The allow-list is passed in
//! explicitly rather than read from process state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::ParseIntError;

/// Port used when an `http` request carries no explicit port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Port used for every other scheme when no explicit port is given
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Result of resolving a request host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDetails {
    /// Request scheme (`http`, `https`, ...)
    pub scheme: String,
    /// Site subdomain, empty when the host does not address a site
    pub subdomain: String,
    /// Host with the site subdomain stripped
    pub hostname: String,
    /// Explicit port, or the scheme default
    pub port: u16,
    /// `scheme://[subdomain.]hostname[:port]`
    pub canonical_url: String,
}

impl HostDetails {
    /// Details for a request without a host: only the scheme is known
    pub fn without_host(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            subdomain: String::new(),
            hostname: String::new(),
            port: DEFAULT_HTTPS_PORT,
            canonical_url: String::new(),
        }
    }

    /// Whether the host addressed a site subdomain
    pub fn has_subdomain(&self) -> bool {
        !self.subdomain.is_empty()
    }
}

/// Allow-list of base domains permitted to host site subdomains.
///
/// Entries may carry a leading `.` (wildcard marker); it is stripped on
/// construction. Classification depends only on set membership, so entry
/// order is irrelevant, but the list must not contain fragments of other
/// hosts: with `0.0.1` configured, `127.0.0.1` would resolve to subdomain
/// `127`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    domains: HashSet<String>,
}

impl AllowList {
    /// Build an allow-list from configured entries
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = entries
            .into_iter()
            .map(|entry| {
                let entry = entry.as_ref();
                entry.strip_prefix('.').unwrap_or(entry).to_string()
            })
            .collect();
        Self { domains }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.domains.contains(host)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Whether a request for `raw_host` (`host[:port]`) may be served: the
    /// host itself or one of its dot-suffixes must be listed.
    pub fn permits(&self, raw_host: &str) -> bool {
        let host = raw_host.split(':').next().unwrap_or(raw_host);
        if host.is_empty() {
            return false;
        }
        let mut candidate = host;
        loop {
            if self.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, rest)) if !rest.is_empty() => candidate = rest,
                _ => return false,
            }
        }
    }

    /// Resolve a raw host header (`host[:port]`) for the given scheme
    pub fn resolve(
        &self,
        scheme: &str,
        raw_host: Option<&str>,
    ) -> Result<HostDetails, HostResolveError> {
        let Some(raw_host) = raw_host else {
            return Ok(HostDetails::without_host(scheme));
        };

        let mut parts = raw_host.split(':');
        let host = parts.next().unwrap_or(raw_host);

        let port = match parts.next() {
            Some(port) => port
                .parse::<u16>()
                .map_err(|source| HostResolveError::InvalidPort {
                    port: port.to_string(),
                    source,
                })?,
            None if scheme == "http" => DEFAULT_HTTP_PORT,
            None => DEFAULT_HTTPS_PORT,
        };

        let candidate = host.split('.').next().unwrap_or(host);
        let remainder = host.get(candidate.len() + 1..).unwrap_or("");

        let (subdomain, hostname) = if self.contains(host) || !self.contains(remainder) {
            ("", host)
        } else {
            (candidate, remainder)
        };

        Ok(HostDetails {
            scheme: scheme.to_string(),
            subdomain: subdomain.to_string(),
            hostname: hostname.to_string(),
            port,
            canonical_url: canonical_url(scheme, subdomain, hostname, port),
        })
    }
}

/// Resolve `raw_host` against an un-normalized allow-list
pub fn resolve<S: AsRef<str>>(
    scheme: &str,
    raw_host: Option<&str>,
    allow_list: &[S],
) -> Result<HostDetails, HostResolveError> {
    AllowList::new(allow_list).resolve(scheme, raw_host)
}

/// Assemble `scheme://[subdomain.]hostname[:port]`, omitting the port when it
/// is the default for the scheme
pub fn canonical_url(scheme: &str, subdomain: &str, hostname: &str, port: u16) -> String {
    let subdomain_prefix = if subdomain.is_empty() {
        String::new()
    } else {
        format!("{}.", subdomain)
    };

    let default_port = (scheme == "https" && port == DEFAULT_HTTPS_PORT)
        || (scheme == "http" && port == DEFAULT_HTTP_PORT);
    let port_suffix = if default_port {
        String::new()
    } else {
        format!(":{}", port)
    };

    format!("{}://{}{}{}", scheme, subdomain_prefix, hostname, port_suffix)
}

/// Errors that can occur during host resolution
#[derive(Debug, thiserror::Error)]
pub enum HostResolveError {
    #[error("Invalid port in host header: {port:?}")]
    InvalidPort {
        port: String,
        #[source]
        source: ParseIntError,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn allow_list() -> AllowList {
        AllowList::new([".dev-faq.com"])
    }

    fn resolve_ok(scheme: &str, host: &str) -> HostDetails {
        allow_list()
            .resolve(scheme, Some(host))
            .expect("host should resolve")
    }

    #[test]
    fn test_allow_list_strips_leading_dot() {
        let list = AllowList::new([".dev-faq.com", "localhost", "..double"]);
        assert!(list.contains("dev-faq.com"));
        assert!(list.contains("localhost"));
        assert!(list.contains(".double"));
        assert!(!list.contains(".dev-faq.com"));
        assert!(!list.is_empty());
    }

    #[test]
    fn test_permits_listed_hosts_and_subdomains() {
        let list = AllowList::new([".dev-faq.com", "localhost"]);
        assert!(list.permits("dev-faq.com"));
        assert!(list.permits("python.dev-faq.com"));
        assert!(list.permits("python.dev-faq.com:8000"));
        assert!(list.permits("a.b.dev-faq.com"));
        assert!(list.permits("localhost:8000"));
    }

    #[test]
    fn test_permits_rejects_foreign_hosts() {
        let list = AllowList::new([".dev-faq.com"]);
        assert!(!list.permits("evil.example"));
        assert!(!list.permits("dev-faq.com.evil.example"));
        assert!(!list.permits("notdev-faq.com"));
        assert!(!list.permits(""));
        assert!(!list.permits(":443"));
        assert!(!AllowList::default().permits("localhost"));
    }

    #[test]
    fn test_site_subdomain() {
        let details = resolve_ok("http", "python.dev-faq.com");
        assert_eq!(details.scheme, "http");
        assert_eq!(details.subdomain, "python");
        assert_eq!(details.hostname, "dev-faq.com");
        assert_eq!(details.port, 80);
        assert_eq!(details.canonical_url, "http://python.dev-faq.com");
        assert!(details.has_subdomain());
    }

    #[test]
    fn test_site_subdomain_with_port() {
        let details = resolve_ok("http", "python.dev-faq.com:8080");
        assert_eq!(details.subdomain, "python");
        assert_eq!(details.hostname, "dev-faq.com");
        assert_eq!(details.port, 8080);
        assert_eq!(details.canonical_url, "http://python.dev-faq.com:8080");
    }

    #[test]
    fn test_base_domain_with_port() {
        let details = resolve_ok("https", "dev-faq.com:8080");
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "dev-faq.com");
        assert_eq!(details.port, 8080);
        assert_eq!(details.canonical_url, "https://dev-faq.com:8080");
    }

    #[test]
    fn test_base_domain_exact_match() {
        let details = resolve_ok("https", "dev-faq.com");
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "dev-faq.com");
        assert_eq!(details.canonical_url, "https://dev-faq.com");
    }

    #[test]
    fn test_ipv4_literal() {
        let details = resolve_ok("https", "127.0.0.1");
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "127.0.0.1");
        assert_eq!(details.port, 443);
        assert_eq!(details.canonical_url, "https://127.0.0.1");
    }

    #[test]
    fn test_foreign_domain() {
        let details = resolve_ok("https", "other.domain.com");
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "other.domain.com");
        assert_eq!(details.canonical_url, "https://other.domain.com");
    }

    #[test]
    fn test_single_label_host() {
        let details = resolve_ok("http", "localhost:3000");
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "localhost");
        assert_eq!(details.canonical_url, "http://localhost:3000");
    }

    #[test]
    fn test_allow_listed_full_host_wins() {
        // Both the full host and its remainder are allow-listed
        let list = AllowList::new(["docs.dev-faq.com", "dev-faq.com"]);
        let details = list.resolve("https", Some("docs.dev-faq.com")).unwrap();
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "docs.dev-faq.com");
    }

    #[test]
    fn test_only_first_label_is_subdomain() {
        let details = resolve_ok("https", "a.b.dev-faq.com");
        // Remainder "b.dev-faq.com" is not allow-listed
        assert_eq!(details.subdomain, "");
        assert_eq!(details.hostname, "a.b.dev-faq.com");
    }

    #[test]
    fn test_default_ports_by_scheme() {
        assert_eq!(resolve_ok("http", "dev-faq.com").port, 80);
        assert_eq!(resolve_ok("https", "dev-faq.com").port, 443);
        assert_eq!(resolve_ok("ftp", "dev-faq.com").port, 443);
        assert_eq!(resolve_ok("HTTP", "dev-faq.com").port, 443);
    }

    #[test]
    fn test_canonical_url_port_suffix() {
        assert_eq!(canonical_url("https", "", "a.com", 443), "https://a.com");
        assert_eq!(canonical_url("http", "", "a.com", 80), "http://a.com");
        assert_eq!(canonical_url("http", "", "a.com", 443), "http://a.com:443");
        assert_eq!(canonical_url("https", "", "a.com", 80), "https://a.com:80");
        assert_eq!(canonical_url("ftp", "x", "a.com", 443), "ftp://x.a.com:443");
    }

    #[test]
    fn test_unknown_scheme_keeps_port_in_url() {
        let details = resolve_ok("ws", "python.dev-faq.com");
        assert_eq!(details.port, 443);
        assert_eq!(details.canonical_url, "ws://python.dev-faq.com:443");
    }

    #[test]
    fn test_missing_host() {
        let details = allow_list().resolve("http", None).unwrap();
        assert_eq!(details, HostDetails::without_host("http"));
        assert_eq!(details.port, 443);
        assert_eq!(details.hostname, "");
        assert_eq!(details.canonical_url, "");
    }

    #[test]
    fn test_invalid_port() {
        for host in ["dev-faq.com:abc", "dev-faq.com:", "dev-faq.com:99999"] {
            let result = allow_list().resolve("https", Some(host));
            assert!(
                matches!(result, Err(HostResolveError::InvalidPort { .. })),
                "expected invalid port for {host}"
            );
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let first = resolve("https", Some("python.dev-faq.com:8443"), &[".dev-faq.com"]).unwrap();
        let second = resolve("https", Some("python.dev-faq.com:8443"), &[".dev-faq.com"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_free_function_normalizes() {
        let allowed = vec![".dev-faq.com".to_string()];
        let details = resolve("http", Some("php.dev-faq.com"), &allowed).unwrap();
        assert_eq!(details.subdomain, "php");
        assert_eq!(details.hostname, "dev-faq.com");
    }

    #[test]
    fn test_fragment_in_allow_list_misclassifies() {
        // Configuration hygiene: a fragment entry turns an IP into a "site"
        let list = AllowList::new(["0.0.1"]);
        let details = list.resolve("https", Some("127.0.0.1")).unwrap();
        assert_eq!(details.subdomain, "127");
        assert_eq!(details.hostname, "0.0.1");
    }
}
