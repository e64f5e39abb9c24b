//! Resolution of server hosts into API base URLs, and validation of resource IDs.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::{MoveitError, Result};

/// An explicit `http://` or `https://` base URL.
static SCHEME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)https?://").expect("Invalid scheme regex"));

/// A bare host fragment such as `example.com` or `example.com:8443`.
static HOST_FRAGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::\d{1,5})?$")
        .expect("Invalid host fragment regex")
});

/// Valid MOVEit resource ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Resolve a server host into the base URL every endpoint hangs off.
///
/// Accepts:
/// - A host fragment, expanded to `https://moveit.<fragment>`
/// - An explicit `http(s)://` URL, used as-is (useful for non-standard deployments)
///
/// The returned URL never ends with a slash.
///
/// # Examples
///
/// ```
/// use moveit_client::host::resolve_base_url;
///
/// let url = resolve_base_url("example.com").unwrap();
/// assert_eq!(url, "https://moveit.example.com");
///
/// let url = resolve_base_url("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(url, "http://127.0.0.1:8080");
/// ```
pub fn resolve_base_url(host: &str) -> Result<String> {
    let trimmed = host.trim();

    if trimmed.is_empty() {
        return Err(MoveitError::InvalidHost(host.to_string()));
    }

    if SCHEME_REGEX.is_match(trimmed) {
        let parsed = Url::parse(trimmed).map_err(|_| MoveitError::InvalidHost(host.to_string()))?;
        if parsed.host_str().is_none() || parsed.query().is_some() {
            return Err(MoveitError::InvalidHost(host.to_string()));
        }
        return Ok(trimmed.trim_end_matches('/').to_string());
    }

    if HOST_FRAGMENT_REGEX.is_match(trimmed) {
        let base = format!("https://moveit.{}", trimmed);
        Url::parse(&base).map_err(|_| MoveitError::InvalidHost(host.to_string()))?;
        return Ok(base);
    }

    Err(MoveitError::InvalidHost(host.to_string()))
}

/// Validate a file or folder ID before it is placed in a request path.
pub fn validate_id(id: &str) -> Result<String> {
    let trimmed = id.trim();

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(MoveitError::InvalidId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fragment() {
        assert_eq!(
            resolve_base_url("example.com").unwrap(),
            "https://moveit.example.com"
        );
        assert_eq!(
            resolve_base_url("corp.example.org:8443").unwrap(),
            "https://moveit.corp.example.org:8443"
        );
    }

    #[test]
    fn test_resolve_explicit_url() {
        assert_eq!(
            resolve_base_url("https://transfer.example.com/").unwrap(),
            "https://transfer.example.com"
        );
        assert_eq!(
            resolve_base_url("HTTP://127.0.0.1:4000").unwrap(),
            "HTTP://127.0.0.1:4000"
        );
    }

    #[test]
    fn test_resolve_with_whitespace() {
        assert_eq!(
            resolve_base_url("  example.com  ").unwrap(),
            "https://moveit.example.com"
        );
    }

    #[test]
    fn test_invalid_host() {
        assert!(resolve_base_url("").is_err());
        assert!(resolve_base_url("   ").is_err());
        assert!(resolve_base_url("example.com/path").is_err());
        assert!(resolve_base_url("-bad.example.com").is_err());
        assert!(resolve_base_url("https://").is_err());
    }

    #[test]
    fn test_validate_id() {
        assert_eq!(validate_id("123456789").unwrap(), "123456789");
        assert_eq!(validate_id(" abc-123_XYZ ").unwrap(), "abc-123_XYZ");
        assert!(validate_id("").is_err());
        assert!(validate_id("12/34").is_err());
        assert!(validate_id("../etc").is_err());
    }
}
