//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::host::resolve_base_url;

/// Default upper bound on the number of pages a single listing may fetch.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Immutable settings shared by every request a [`MoveitClient`](crate::MoveitClient) makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    request_timeout: Option<Duration>,
    max_pages: u32,
    listing_deadline: Option<Duration>,
    staging_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Create a configuration for a server.
    ///
    /// # Arguments
    /// * `host` - Host fragment (`example.com` → `https://moveit.example.com`) or explicit base URL
    pub fn new(host: &str) -> Result<Self> {
        Ok(Self {
            base_url: resolve_base_url(host)?,
            request_timeout: None,
            max_pages: DEFAULT_MAX_PAGES,
            listing_deadline: None,
            staging_dir: None,
        })
    }

    /// Timeout applied to each individual HTTP request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Maximum number of page requests a listing may issue. Clamped to at least 1.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Deadline for a whole listing, across all of its page requests.
    pub fn listing_deadline(mut self, deadline: Duration) -> Self {
        self.listing_deadline = Some(deadline);
        self
    }

    /// Directory for download staging files. Defaults to the system temp directory.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn page_limit(&self) -> u32 {
        self.max_pages
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.listing_deadline
    }

    pub fn staging(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("example.com").unwrap();
        assert_eq!(config.base_url(), "https://moveit.example.com");
        assert_eq!(config.page_limit(), DEFAULT_MAX_PAGES);
        assert!(config.timeout().is_none());
        assert!(config.deadline().is_none());
        assert!(config.staging().is_none());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://localhost:9000")
            .unwrap()
            .request_timeout(Duration::from_secs(30))
            .max_pages(0)
            .listing_deadline(Duration::from_secs(300))
            .staging_dir("/var/tmp/moveit");

        assert_eq!(config.base_url(), "http://localhost:9000");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.page_limit(), 1);
        assert_eq!(config.deadline(), Some(Duration::from_secs(300)));
        assert_eq!(config.staging(), Some(Path::new("/var/tmp/moveit")));
    }

    #[test]
    fn test_invalid_host() {
        assert!(ClientConfig::new("").is_err());
    }
}
