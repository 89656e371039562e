//! Resolver configuration

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::package_name::DEFAULT_THIRD_PARTY_DIR;

/// Environment variable prefix for overrides (`DEPSCOUT_CONCURRENCY=16`)
pub const ENV_PREFIX: &str = "DEPSCOUT";

/// Fingerprint tier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Similarity required for files with a recovered mapping
    pub min_similarity: f64,
    /// Similarity required for minified vendor chunks
    pub minified_min_similarity: f64,
    /// Published versions compared per package
    pub max_versions_to_check: usize,
    /// Compare pre-release versions too
    pub include_prereleases: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.7,
            minified_min_similarity: 0.6,
            max_versions_to_check: 50,
            include_prereleases: false,
        }
    }
}

/// Options controlling one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Network calls in flight per batch
    pub concurrency: usize,
    /// Scan license banners (mis-attributes in nested dependency trees)
    pub enable_banner_detection: bool,
    /// Run the fingerprint tier when an oracle is configured
    pub enable_fingerprinting: bool,
    /// Run peer dependency inference
    pub enable_peer_inference: bool,
    /// Fall back to the registry's `latest` tag
    pub enable_latest_fallback: bool,
    /// Validate resolved versions against the registry
    pub enable_validation: bool,
    /// Ask the registry whether unknown names are published
    pub registry_checks: bool,
    /// Directory name holding installed third-party packages
    pub third_party_dir: String,
    /// Fingerprint thresholds
    pub fingerprint: FingerprintConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            enable_banner_detection: false,
            enable_fingerprinting: true,
            enable_peer_inference: true,
            enable_latest_fallback: false,
            enable_validation: true,
            registry_checks: true,
            third_party_dir: DEFAULT_THIRD_PARTY_DIR.to_string(),
            fingerprint: FingerprintConfig::default(),
        }
    }
}

fn check_similarity(field: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ResolveError::InvalidConfiguration {
            reason: format!("{field} is {value}"),
            expected: "a similarity in (0, 1]".to_string(),
        })
    }
}

impl ResolverConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ResolveError::InvalidConfiguration {
                reason: "concurrency is 0".to_string(),
                expected: "at least one request in flight".to_string(),
            });
        }
        if self.third_party_dir.trim().is_empty() || self.third_party_dir.contains('/') {
            return Err(ResolveError::InvalidConfiguration {
                reason: format!("third_party_dir is {:?}", self.third_party_dir),
                expected: "a single directory name".to_string(),
            });
        }
        check_similarity("fingerprint.min_similarity", self.fingerprint.min_similarity)?;
        check_similarity(
            "fingerprint.minified_min_similarity",
            self.fingerprint.minified_min_similarity,
        )?;
        if self.fingerprint.max_versions_to_check == 0 {
            return Err(ResolveError::InvalidConfiguration {
                reason: "fingerprint.max_versions_to_check is 0".to_string(),
                expected: "at least one version".to_string(),
            });
        }
        Ok(())
    }

    /// Hex sha256 over the canonical JSON form
    pub fn options_hash(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&json)))
    }
}

/// Loads [`ResolverConfig`] from an optional TOML file plus environment overrides
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Environment overrides only
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Read a TOML file first; a missing file is not an error
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use a different environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Build, deserialize and validate the configuration.
    ///
    /// Nested keys use a double underscore:
    /// `DEPSCOUT_FINGERPRINT__MIN_SIMILARITY=0.8`.
    pub fn load(&self) -> Result<ResolverConfig> {
        let mut builder = Config::builder();
        if let Some(path) = &self.config_path {
            debug!(path = %path.display(), "Loading resolver configuration");
            builder = builder.add_source(File::from(path.clone()).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ResolverConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write a configuration as TOML
    pub fn save(config: &ResolverConfig, path: &Path) -> Result<()> {
        let toml = toml::to_string(config)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ResolveError::IoError {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, toml).map_err(|e| ResolveError::IoError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
