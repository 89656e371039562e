//! Registry client configuration and URL layout

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Public npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Where the registry lives and how patiently to talk to it.
///
/// Missing keys fall back to the public registry's defaults, so a config file
/// pointing at a mirror only needs `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry root, e.g. a Verdaccio mirror; a trailing slash is ignored
    pub base_url: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Extra attempts after a transient failure (0 = ask once)
    pub retry_count: u32,
    /// First backoff delay; doubles per retry
    pub retry_delay: Duration,
    /// Proxy for every registry request
    pub proxy: Option<String>,
    /// Sent as `User-Agent`
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry_count: 2,
            retry_delay: Duration::from_millis(500),
            proxy: None,
            user_agent: format!("depscout/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RegistryConfig {
    /// Point the client at a different registry (mirrors, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Ask once and never retry
    pub fn without_retries(mut self) -> Self {
        self.retry_count = 0;
        self
    }

    /// Route requests through a proxy
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Reject a base URL that is not an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(self.registry_root())
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(RegistryError::InvalidUrl(format!(
                "{}: unsupported scheme {other}",
                self.base_url
            ))),
        }
    }

    /// Base URL without a trailing slash
    pub fn registry_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Packument URL. Scoped names keep the `@` and escape the separator,
    /// as the registry expects.
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.registry_root(), name.replace('/', "%2F"))
    }

    /// Document URL for one version or dist-tag of a package
    pub fn version_url(&self, name: &str, version: &str) -> String {
        format!("{}/{}", self.package_url(name), version)
    }
}
