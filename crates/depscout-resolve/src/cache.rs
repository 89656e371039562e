//! Whole-run result cache
//!
//! A run is keyed by the extraction's content hash plus a hash of every
//! option that can change its outcome. A hit replaces the entire run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ResolveError, Result};
use crate::pipeline::PipelineOutput;
use crate::tree::SourceTree;

/// Cache key for a run: `sha256(tree hash ‖ options hash)`
pub fn cache_key<O: Serialize>(tree: &SourceTree, options: &O) -> Result<String> {
    let options = serde_json::to_vec(options)?;
    let mut hasher = Sha256::new();
    hasher.update(tree.content_hash().as_bytes());
    hasher.update(Sha256::digest(&options));
    Ok(hex::encode(hasher.finalize()))
}

/// Storage for completed runs
#[async_trait]
pub trait RunCache: Send + Sync {
    /// Cached output for `key`; unreadable entries are misses
    async fn get(&self, key: &str) -> Result<Option<PipelineOutput>>;

    /// Store the output of a run
    async fn set(&self, key: &str, output: &PipelineOutput) -> Result<()>;
}

/// In-process run cache
#[derive(Debug, Clone, Default)]
pub struct MemoryRunCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryRunCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached runs
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_error(operation: &str) -> ResolveError {
        ResolveError::CacheError {
            operation: operation.to_string(),
            reason: "Failed to acquire lock".to_string(),
        }
    }
}

#[async_trait]
impl RunCache for MemoryRunCache {
    async fn get(&self, key: &str) -> Result<Option<PipelineOutput>> {
        let entries = self.entries.read().map_err(|_| Self::lock_error("get"))?;
        match entries.get(key) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, output: &PipelineOutput) -> Result<()> {
        let json = serde_json::to_string(output)?;
        let mut entries = self.entries.write().map_err(|_| Self::lock_error("set"))?;
        entries.insert(key.to_string(), json);
        Ok(())
    }
}

/// One JSON file per run under a directory
#[derive(Debug, Clone)]
pub struct FileRunCache {
    dir: PathBuf,
}

impl FileRunCache {
    /// Cache runs under `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl RunCache for FileRunCache {
    async fn get(&self, key: &str) -> Result<Option<PipelineOutput>> {
        let path = self.entry_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable run cache entry");
                return Ok(None);
            }
        };
        match serde_json::from_str(&content) {
            Ok(output) => {
                debug!(key = %key, "Run cache hit");
                Ok(Some(output))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed run cache entry, recomputing");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, output: &PipelineOutput) -> Result<()> {
        let io_error = |path: &Path, e: std::io::Error| ResolveError::IoError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let path = self.entry_path(key);
        let json = serde_json::to_string_pretty(output)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| io_error(&path, e))
    }
}
