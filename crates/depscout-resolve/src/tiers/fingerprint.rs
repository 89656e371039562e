use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::config::FingerprintConfig;
use crate::error::Result;
use crate::models::{ResolvedVersion, VersionSource};
use crate::progress::run_bounded;
use crate::tree::{FileOrigin, RecoveredFile, SourceTree};

/// Options passed to the fingerprint oracle for one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintOptions {
    /// Minimum similarity (0..=1) for a version to count as a match
    pub min_similarity: f64,
    /// Upper bound on published versions compared
    pub max_versions_to_check: usize,
    /// Whether pre-release versions are candidates
    pub include_prereleases: bool,
}

/// Compares recovered file contents against published versions of a package
#[async_trait]
pub trait FingerprintOracle: Send + Sync {
    /// Best matching published version, if any clears `min_similarity`
    async fn fingerprint_match(
        &self,
        name: &str,
        files: &[RecoveredFile],
        options: &FingerprintOptions,
    ) -> Result<Option<ResolvedVersion>>;
}

#[derive(Clone)]
struct Job {
    name: String,
    files: Vec<RecoveredFile>,
    options: FingerprintOptions,
    source: VersionSource,
}

/// Tier 4: content fingerprinting through a [`FingerprintOracle`]
pub struct FingerprintTier {
    oracle: Arc<dyn FingerprintOracle>,
    config: FingerprintConfig,
    concurrency: usize,
}

impl FingerprintTier {
    /// Create the tier
    pub fn new(oracle: Arc<dyn FingerprintOracle>, config: FingerprintConfig, concurrency: usize) -> Self {
        Self {
            oracle,
            config,
            concurrency,
        }
    }

    fn options(&self, min_similarity: f64) -> FingerprintOptions {
        FingerprintOptions {
            min_similarity,
            max_versions_to_check: self.config.max_versions_to_check,
            include_prereleases: self.config.include_prereleases,
        }
    }

    /// Mapped files of the package at the strict threshold, otherwise the
    /// minified vendor chunks at the relaxed one
    fn job(&self, tree: &SourceTree, name: &str) -> Option<Job> {
        let mapped: Vec<RecoveredFile> = tree
            .package_files(name)
            .into_iter()
            .filter(|f| f.origin == FileOrigin::SourceMap)
            .cloned()
            .collect();
        if !mapped.is_empty() {
            return Some(Job {
                name: name.to_string(),
                files: mapped,
                options: self.options(self.config.min_similarity),
                source: VersionSource::Fingerprint,
            });
        }

        let chunks: Vec<RecoveredFile> = tree
            .files()
            .filter(|f| f.origin == FileOrigin::VendorChunk)
            .cloned()
            .collect();
        if chunks.is_empty() {
            return None;
        }
        Some(Job {
            name: name.to_string(),
            files: chunks,
            options: self.options(self.config.minified_min_similarity),
            source: VersionSource::FingerprintMinified,
        })
    }
}

#[async_trait]
impl VersionTier for FingerprintTier {
    fn kind(&self) -> TierKind {
        TierKind::Fingerprint
    }

    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult {
        let jobs: Vec<Job> = pending.iter().filter_map(|n| self.job(ctx.tree, n)).collect();
        debug!(jobs = jobs.len(), "Fingerprinting packages");

        let oracle = &self.oracle;
        let outcomes = run_bounded(
            jobs,
            self.concurrency,
            crate::progress::Phase::Tier(TierKind::Fingerprint),
            ctx.reporter,
            |job| job.name.clone(),
            |job| async move {
                oracle
                    .fingerprint_match(&job.name, &job.files, &job.options)
                    .await
            },
        )
        .await;

        let mut result = TierResult::default();
        for (job, outcome) in outcomes {
            match outcome {
                Ok(Some(found)) => {
                    result.resolved.insert(
                        job.name,
                        ResolvedVersion::new(found.version, found.confidence, job.source),
                    );
                }
                Ok(None) => {}
                Err(e) => warn!(package = %job.name, error = %e, "Fingerprint match failed"),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, DependencyRecord};
    use crate::progress::ProgressReporter;
    use crate::ResolveError;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOracle {
        calls: Mutex<Vec<(String, usize, f64)>>,
    }

    #[async_trait]
    impl FingerprintOracle for RecordingOracle {
        async fn fingerprint_match(
            &self,
            name: &str,
            files: &[RecoveredFile],
            options: &FingerprintOptions,
        ) -> Result<Option<ResolvedVersion>> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), files.len(), options.min_similarity));
            match name {
                "broken" => Err(ResolveError::collaborator("fingerprint", "timeout")),
                "nomatch" => Ok(None),
                _ => Ok(Some(ResolvedVersion::new(
                    "1.0.0",
                    Confidence::Medium,
                    VersionSource::Fingerprint,
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_thresholds_and_sources_follow_file_origin() {
        let tree = SourceTree::from_files([
            RecoveredFile::new("node_modules/mapped/index.js", "a"),
            RecoveredFile::new("node_modules/mapped/util.js", "b"),
            RecoveredFile::new("node_modules/broken/index.js", "c"),
            RecoveredFile::vendor_chunk("static/js/vendor.min.js", "!function(){}"),
        ]);
        let oracle = Arc::new(RecordingOracle::default());
        let tier = FingerprintTier::new(oracle.clone(), FingerprintConfig::default(), 2);
        let records: BTreeMap<String, DependencyRecord> = BTreeMap::new();
        let reporter = ProgressReporter::disabled();
        let ctx = TierContext {
            tree: &tree,
            records: &records,
            seed_facts: &[],
            reporter: &reporter,
        };

        let pending = vec!["mapped".to_string(), "minified".to_string(), "broken".to_string()];
        let result = tier.resolve(&pending, &ctx).await;

        assert_eq!(result.resolved["mapped"].source, VersionSource::Fingerprint);
        assert_eq!(result.resolved["mapped"].confidence, Confidence::Medium);
        assert_eq!(result.resolved["minified"].source, VersionSource::FingerprintMinified);
        assert!(!result.resolved.contains_key("broken"));

        let mut calls = oracle.calls.lock().unwrap().clone();
        calls.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(calls[0], ("broken".to_string(), 1, 0.7));
        assert_eq!(calls[1], ("mapped".to_string(), 2, 0.7));
        assert_eq!(calls[2], ("minified".to_string(), 1, 0.6));
    }
}
