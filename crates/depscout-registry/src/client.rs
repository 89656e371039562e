//! Registry client trait and the npm HTTP implementation

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::RegistryConfig,
    error::{RegistryError, Result},
    metadata::PackageMetadata,
    retry::RetryPolicy,
};

/// Abbreviated metadata document, smaller than the full packument but still
/// carrying `peerDependencies` per version.
const ABBREVIATED_ACCEPT: &str = "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8";

/// Read access to a package registry.
///
/// `Ok(false)` / `Ok(None)` are definitive negative answers; `Err` means the
/// registry could not be asked and the caller chooses a fallback.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Whether any version of the package is published
    async fn package_exists(&self, name: &str) -> Result<bool>;

    /// Whether the exact `name@version` is published
    async fn version_exists(&self, name: &str, version: &str) -> Result<bool>;

    /// The version tagged `latest`
    async fn latest_version(&self, name: &str) -> Result<Option<String>>;

    /// Every published version with its peer-dependency ranges
    async fn package_metadata(&self, name: &str) -> Result<Option<PackageMetadata>>;
}

#[derive(Debug, Deserialize)]
struct VersionDocument {
    version: String,
}

/// HTTP client for an npm-compatible registry
pub struct NpmRegistry {
    inner: reqwest::Client,
    config: RegistryConfig,
    retry: RetryPolicy,
}

impl NpmRegistry {
    /// Create a new registry client with configuration
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| RegistryError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let inner = builder
            .build()
            .map_err(|e| RegistryError::BuildError(e.to_string()))?;

        let retry = RetryPolicy {
            max_attempts: config.retry_count,
            initial_delay: config.retry_delay,
            ..Default::default()
        };

        Ok(Self {
            inner,
            config,
            retry,
        })
    }

    /// Create a client for the public registry
    pub fn with_defaults() -> Result<Self> {
        Self::new(RegistryConfig::default())
    }

    /// Get configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registry URL for a package document
    pub fn package_url(&self, name: &str) -> String {
        self.config.package_url(name)
    }

    fn version_url(&self, name: &str, version: &str) -> String {
        self.config.version_url(name, version)
    }

    /// GET with retries; a 404 comes back as `Ok(None)`.
    async fn fetch(&self, url: &str, accept: &str) -> Result<Option<Response>> {
        let parsed = url
            .parse::<url::Url>()
            .map_err(|e| RegistryError::InvalidUrl(e.to_string()))?;

        self.retry
            .run(url, || {
                let request = self
                    .inner
                    .get(parsed.clone())
                    .header(header::ACCEPT, accept);
                async move {
                    debug!("Registry GET: {}", url);
                    let response = request.send().await?;
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if !status.is_success() {
                        return Err(RegistryError::HttpStatus {
                            status,
                            message: response
                                .text()
                                .await
                                .unwrap_or_else(|_| "Unknown error".to_string()),
                        });
                    }
                    Ok(Some(response))
                }
            })
            .await
    }
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    async fn package_exists(&self, name: &str) -> Result<bool> {
        let url = self.package_url(name);
        Ok(self.fetch(&url, ABBREVIATED_ACCEPT).await?.is_some())
    }

    async fn version_exists(&self, name: &str, version: &str) -> Result<bool> {
        let url = self.version_url(name, version);
        Ok(self.fetch(&url, "application/json").await?.is_some())
    }

    async fn latest_version(&self, name: &str) -> Result<Option<String>> {
        let url = self.version_url(name, "latest");
        let Some(response) = self.fetch(&url, "application/json").await? else {
            return Ok(None);
        };
        let doc: VersionDocument = response.json().await.map_err(|e| RegistryError::Decode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(doc.version))
    }

    async fn package_metadata(&self, name: &str) -> Result<Option<PackageMetadata>> {
        let url = self.package_url(name);
        let Some(response) = self.fetch(&url, ABBREVIATED_ACCEPT).await? else {
            return Ok(None);
        };
        let mut metadata: PackageMetadata =
            response.json().await.map_err(|e| RegistryError::Decode {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        if metadata.name.is_empty() {
            metadata.name = name.to_string();
        }
        Ok(Some(metadata))
    }
}

/// Create a shared registry client (Arc-wrapped for cloning)
pub fn shared_registry(config: RegistryConfig) -> Result<Arc<dyn RegistryClient>> {
    Ok(Arc::new(NpmRegistry::new(config)?))
}
