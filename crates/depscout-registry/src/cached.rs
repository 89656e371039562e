//! Cache-first registry wrapper
//!
//! Every lookup consults the cache before the network. Only definitive
//! answers are stored (including "does not exist"); failed calls are passed
//! through uncached so a later run can retry them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{client::RegistryClient, error::Result, metadata::PackageMetadata};

/// Hit/miss counters for the registry cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that went to the registry
    pub misses: u64,
}

impl RegistryCacheStats {
    /// Calculate hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Registry client that memoises another client's definitive answers
pub struct CachedRegistry {
    inner: Arc<dyn RegistryClient>,
    exists: DashMap<String, bool>,
    versions: DashMap<(String, String), bool>,
    latest: DashMap<String, Option<String>>,
    metadata: DashMap<String, Option<Arc<PackageMetadata>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedRegistry {
    /// Wrap a registry client
    pub fn new(inner: Arc<dyn RegistryClient>) -> Self {
        Self {
            inner,
            exists: DashMap::new(),
            versions: DashMap::new(),
            latest: DashMap::new(),
            metadata: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current cache statistics
    pub fn stats(&self) -> RegistryCacheStats {
        RegistryCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached answer
    pub fn clear(&self) {
        self.exists.clear();
        self.versions.clear();
        self.latest.clear();
        self.metadata.clear();
    }

    /// Metadata shared without cloning the version map
    pub async fn shared_metadata(&self, name: &str) -> Result<Option<Arc<PackageMetadata>>> {
        if let Some(cached) = self.metadata.get(name) {
            self.hit("metadata", name);
            return Ok(cached.value().clone());
        }
        self.miss("metadata", name);
        let fetched = self.inner.package_metadata(name).await?.map(Arc::new);
        self.metadata.insert(name.to_string(), fetched.clone());
        Ok(fetched)
    }

    fn hit(&self, kind: &str, name: &str) {
        trace!(kind, package = name, "Registry cache hit");
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self, kind: &str, name: &str) {
        trace!(kind, package = name, "Registry cache miss");
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl RegistryClient for CachedRegistry {
    async fn package_exists(&self, name: &str) -> Result<bool> {
        if let Some(known) = self.exists.get(name) {
            self.hit("exists", name);
            return Ok(*known.value());
        }
        self.miss("exists", name);
        let exists = self.inner.package_exists(name).await?;
        self.exists.insert(name.to_string(), exists);
        Ok(exists)
    }

    async fn version_exists(&self, name: &str, version: &str) -> Result<bool> {
        let key = (name.to_string(), version.to_string());
        if let Some(known) = self.versions.get(&key) {
            self.hit("version", name);
            return Ok(*known.value());
        }
        self.miss("version", name);
        let exists = self.inner.version_exists(name, version).await?;
        self.versions.insert(key, exists);
        Ok(exists)
    }

    async fn latest_version(&self, name: &str) -> Result<Option<String>> {
        if let Some(known) = self.latest.get(name) {
            self.hit("latest", name);
            return Ok(known.value().clone());
        }
        self.miss("latest", name);
        let latest = self.inner.latest_version(name).await?;
        self.latest.insert(name.to_string(), latest.clone());
        Ok(latest)
    }

    async fn package_metadata(&self, name: &str) -> Result<Option<PackageMetadata>> {
        Ok(self
            .shared_metadata(name)
            .await?
            .map(|meta| meta.as_ref().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct CountingRegistry {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl RegistryClient for CountingRegistry {
        async fn package_exists(&self, name: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RegistryError::RetryLimitExceeded { attempts: 1 });
            }
            Ok(name != "private-thing")
        }

        async fn version_exists(&self, _name: &str, version: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(version == "1.0.0")
        }

        async fn latest_version(&self, _name: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn package_metadata(&self, name: &str) -> Result<Option<PackageMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(PackageMetadata::new(name)))
        }
    }

    #[tokio::test]
    async fn test_negative_answers_are_cached() {
        let inner = Arc::new(CountingRegistry::default());
        let cached = CachedRegistry::new(inner.clone());

        assert!(!cached.package_exists("private-thing").await.unwrap());
        assert!(!cached.package_exists("private-thing").await.unwrap());
        assert!(!cached.version_exists("a", "2.0.0").await.unwrap());
        assert!(!cached.version_exists("a", "2.0.0").await.unwrap());
        assert_eq!(cached.latest_version("a").await.unwrap(), None);
        assert_eq!(cached.latest_version("a").await.unwrap(), None);

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        let stats = cached.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(CountingRegistry {
            fail: true,
            ..Default::default()
        });
        let cached = CachedRegistry::new(inner.clone());

        assert!(cached.package_exists("react").await.is_err());
        assert!(cached.package_exists("react").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metadata_is_shared() {
        let inner = Arc::new(CountingRegistry::default());
        let cached = CachedRegistry::new(inner.clone());

        let first = cached.shared_metadata("react").await.unwrap().unwrap();
        let second = cached.shared_metadata("react").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        cached.clear();
        cached.package_metadata("react").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
