//! Version detection pipeline
//!
//! Classifies every imported name, folds aliases into their published
//! names, runs the resolution tiers in priority order and closes with
//! registry validation. Per-package failures never abort a run; the output
//! is always a complete, possibly partially unresolved, record set.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use depscout_registry::{CachedRegistry, RegistryCacheStats, RegistryClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alias::AliasResolver;
use crate::cache::{cache_key, RunCache};
use crate::classifier::DependencyClassifier;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::imports::{collect_imports, ImportExtractor, RegexImportExtractor};
use crate::models::{
    AliasMapping, Classification, DependencyRecord, KnownVersionFact, PeerInference, VersionSource,
    VersionStats,
};
use crate::peer::PeerInferenceEngine;
use crate::progress::ProgressReporter;
use crate::tiers::{
    resolve_first_match, BannerTier, BundleManifest, BundleManifestTier, FingerprintOracle,
    FingerprintTier, PathVersionDetector, PeerDependencyTier, RecoveredManifestTier,
    RegistryLatestTier, TierKind, UnifiedDetector, UnifiedDetectorTier, VersionTier,
};
use crate::tree::SourceTree;
use crate::validator::{ValidationReport, VersionValidator};
use crate::workspace::{WorkspaceRootDetector, WorkspaceRoots};

/// Everything a run produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    /// One record per imported package name
    pub records: BTreeMap<String, DependencyRecord>,
    /// Internal/external partition
    pub classification: Classification,
    /// In-tree package roots
    pub workspace_roots: WorkspaceRoots,
    /// Import aliases folded into their published names
    pub aliases: Vec<AliasMapping>,
    /// Counts by source and confidence
    pub stats: VersionStats,
    /// Details for versions that came from peer inference
    pub peer_results: BTreeMap<String, PeerInference>,
    /// Closing validation outcome
    pub validation: ValidationReport,
    /// Whether this output was served from the run cache
    #[serde(skip)]
    pub from_cache: bool,
}

/// Everything besides the tree that can change a run's outcome
#[derive(Serialize)]
struct RunOptions<'a> {
    config: &'a ResolverConfig,
    tiers: Vec<TierKind>,
    bundle_manifest: Option<&'a BundleManifest>,
    seed_facts: &'a [KnownVersionFact],
}

/// Builder for [`VersionPipeline`]
pub struct VersionPipelineBuilder {
    registry: Arc<CachedRegistry>,
    config: ResolverConfig,
    extractor: Arc<dyn ImportExtractor>,
    detector: Arc<dyn UnifiedDetector>,
    fingerprint: Option<Arc<dyn FingerprintOracle>>,
    bundle_manifest: Option<BundleManifest>,
    seed_facts: Vec<KnownVersionFact>,
    cache: Option<Arc<dyn RunCache>>,
    reporter: ProgressReporter,
}

impl VersionPipelineBuilder {
    /// Resolver options
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Import extractor (defaults to [`RegexImportExtractor`])
    pub fn import_extractor(mut self, extractor: Arc<dyn ImportExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Tier 1 detector (defaults to [`PathVersionDetector`])
    pub fn unified_detector(mut self, detector: Arc<dyn UnifiedDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Fingerprint oracle; without one the fingerprint tier is skipped
    pub fn fingerprint_oracle(mut self, oracle: Arc<dyn FingerprintOracle>) -> Self {
        self.fingerprint = Some(oracle);
        self
    }

    /// The extraction's bundle manifest
    pub fn bundle_manifest(mut self, manifest: BundleManifest) -> Self {
        self.bundle_manifest = Some(manifest);
        self
    }

    /// Versions known before the run, used as peer inference input
    pub fn known_versions<I: IntoIterator<Item = KnownVersionFact>>(mut self, facts: I) -> Self {
        self.seed_facts = facts.into_iter().collect();
        self.seed_facts.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }

    /// Whole-run cache
    pub fn cache(mut self, cache: Arc<dyn RunCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Progress sink
    pub fn progress(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Validate the configuration and build the pipeline
    pub fn build(self) -> Result<VersionPipeline> {
        self.config.validate()?;
        Ok(VersionPipeline {
            registry: self.registry,
            config: self.config,
            extractor: self.extractor,
            detector: self.detector,
            fingerprint: self.fingerprint,
            bundle_manifest: self.bundle_manifest,
            seed_facts: self.seed_facts,
            cache: self.cache,
            reporter: self.reporter,
        })
    }
}

/// Resolves a recovered tree's imports to classified, versioned records
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use depscout_registry::NpmRegistry;
/// use depscout_resolve::{RecoveredFile, ResolverConfig, SourceTree, VersionPipeline};
///
/// # tokio_test::block_on(async {
/// // Offline: no classification lookups, peer inference or validation
/// let config = ResolverConfig {
///     registry_checks: false,
///     enable_peer_inference: false,
///     enable_validation: false,
///     ..Default::default()
/// };
/// let registry = Arc::new(NpmRegistry::with_defaults().unwrap());
/// let pipeline = VersionPipeline::builder(registry).config(config).build().unwrap();
///
/// let tree = SourceTree::from_files([
///     RecoveredFile::new("src/main.ts", "import { z } from 'zod';"),
///     RecoveredFile::new("node_modules/zod/package.json", r#"{"name":"zod","version":"3.22.4"}"#),
/// ]);
/// let output = pipeline.run(&tree).await.unwrap();
/// assert_eq!(output.records["zod"].version.as_deref(), Some("3.22.4"));
/// # });
/// ```
pub struct VersionPipeline {
    registry: Arc<CachedRegistry>,
    config: ResolverConfig,
    extractor: Arc<dyn ImportExtractor>,
    detector: Arc<dyn UnifiedDetector>,
    fingerprint: Option<Arc<dyn FingerprintOracle>>,
    bundle_manifest: Option<BundleManifest>,
    seed_facts: Vec<KnownVersionFact>,
    cache: Option<Arc<dyn RunCache>>,
    reporter: ProgressReporter,
}

impl VersionPipeline {
    /// Start building a pipeline around a registry client.
    ///
    /// Every registry read goes through a [`CachedRegistry`] owned by the
    /// pipeline.
    pub fn builder(registry: Arc<dyn RegistryClient>) -> VersionPipelineBuilder {
        VersionPipelineBuilder {
            registry: Arc::new(CachedRegistry::new(registry)),
            config: ResolverConfig::default(),
            extractor: Arc::new(RegexImportExtractor::new()),
            detector: Arc::new(PathVersionDetector::new()),
            fingerprint: None,
            bundle_manifest: None,
            seed_facts: Vec::new(),
            cache: None,
            reporter: ProgressReporter::disabled(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Registry cache hit/miss counters
    pub fn registry_stats(&self) -> RegistryCacheStats {
        self.registry.stats()
    }

    fn shared_registry(&self) -> Arc<dyn RegistryClient> {
        self.registry.clone()
    }

    /// Tiers in run order for the current configuration
    pub fn tiers(&self) -> Vec<Box<dyn VersionTier>> {
        let concurrency = self.config.concurrency;
        let mut tiers: Vec<Box<dyn VersionTier>> = vec![
            Box::new(UnifiedDetectorTier::new(self.detector.clone())),
            Box::new(RecoveredManifestTier::new()),
        ];
        if self.config.enable_banner_detection {
            tiers.push(Box::new(BannerTier::new()));
        }
        if let (true, Some(oracle)) = (self.config.enable_fingerprinting, &self.fingerprint) {
            tiers.push(Box::new(FingerprintTier::new(
                oracle.clone(),
                self.config.fingerprint.clone(),
                concurrency,
            )));
        }
        if self.config.enable_peer_inference {
            let engine = PeerInferenceEngine::new(self.registry.clone(), concurrency)
                .with_prereleases(self.config.fingerprint.include_prereleases);
            tiers.push(Box::new(PeerDependencyTier::new(engine)));
        }
        if let Some(manifest) = &self.bundle_manifest {
            tiers.push(Box::new(BundleManifestTier::new(manifest)));
        }
        if self.config.enable_latest_fallback {
            tiers.push(Box::new(RegistryLatestTier::new(self.shared_registry(), concurrency)));
        }
        tiers
    }

    fn classifier(&self) -> DependencyClassifier {
        let classifier = DependencyClassifier::new(self.shared_registry(), self.config.concurrency);
        if self.config.registry_checks {
            classifier
        } else {
            classifier.without_registry_checks()
        }
    }

    fn run_key(&self, tree: &SourceTree) -> Result<String> {
        let options = RunOptions {
            config: &self.config,
            tiers: self.tiers().iter().map(|t| t.kind()).collect(),
            bundle_manifest: self.bundle_manifest.as_ref(),
            seed_facts: &self.seed_facts,
        };
        cache_key(tree, &options)
    }

    /// Resolve every import in `tree`.
    ///
    /// Only fails when the run key cannot be computed; cache problems are
    /// logged and the run is recomputed.
    pub async fn run(&self, tree: &SourceTree) -> Result<PipelineOutput> {
        let tree: Cow<'_, SourceTree> = if tree.third_party_dir() == self.config.third_party_dir {
            Cow::Borrowed(tree)
        } else {
            Cow::Owned(tree.clone().with_third_party_dir(self.config.third_party_dir.clone()))
        };

        let key = match &self.cache {
            Some(_) => Some(self.run_key(&tree)?),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            match cache.get(key).await {
                Ok(Some(mut output)) => {
                    info!(key = %key, records = output.records.len(), "Serving run from cache");
                    output.from_cache = true;
                    return Ok(output);
                }
                Ok(None) => debug!(key = %key, "Run cache miss"),
                Err(e) => warn!(error = %e, "Run cache lookup failed, recomputing"),
            }
        }

        let output = self.resolve(&tree).await;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Err(e) = cache.set(key, &output).await {
                warn!(error = %e, "Failed to store run in cache");
            }
        }
        Ok(output)
    }

    async fn resolve(&self, tree: &SourceTree) -> PipelineOutput {
        let imports = collect_imports(tree, self.extractor.as_ref());
        let mut records: BTreeMap<String, DependencyRecord> = imports
            .by_name
            .iter()
            .map(|(name, files)| {
                let mut record = DependencyRecord::new(name.clone());
                for file in files {
                    record.add_importer(file.clone());
                }
                (name.clone(), record)
            })
            .collect();

        let roots = WorkspaceRootDetector::new().detect(tree);
        let classifier = self.classifier();
        let names: Vec<String> = records.keys().cloned().collect();
        let mut classification = classifier
            .classify(&names, tree, &roots, &self.reporter)
            .await;

        let aliases = AliasResolver::new().detect(tree, &imports, &roots);
        for mapping in &aliases {
            self.fold_alias(mapping, &mut records, &mut classification, &classifier, tree, &roots)
                .await;
        }

        for record in records.values_mut() {
            record.is_private = classification.is_internal(&record.name);
        }

        let tiers = self.tiers();
        let report = resolve_first_match(
            &tiers,
            &mut records,
            tree,
            &self.seed_facts,
            &self.reporter,
        )
        .await;

        let validation = if self.config.enable_validation {
            VersionValidator::new(self.shared_registry(), self.config.concurrency)
                .validate(&mut records, &self.reporter)
                .await
        } else {
            ValidationReport::default()
        };

        let peer_results: BTreeMap<String, PeerInference> = report
            .peer_inferences
            .into_iter()
            .filter(|(name, inference)| {
                records.get(name).is_some_and(|r| {
                    r.source == Some(VersionSource::PeerDep)
                        && r.version.as_deref() == Some(inference.version.as_str())
                })
            })
            .collect();

        let stats = VersionStats::from_records(records.values());
        info!(
            total = stats.total,
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            private = stats.private,
            "Dependency resolution complete"
        );

        PipelineOutput {
            records,
            classification,
            workspace_roots: roots,
            aliases,
            stats,
            peer_results,
            validation,
            from_cache: false,
        }
    }

    /// Rename the alias's record to the published name, merging into an
    /// existing record, and classify the published name if needed
    async fn fold_alias(
        &self,
        mapping: &AliasMapping,
        records: &mut BTreeMap<String, DependencyRecord>,
        classification: &mut Classification,
        classifier: &DependencyClassifier,
        tree: &SourceTree,
        roots: &WorkspaceRoots,
    ) {
        let Some(aliased) = records.remove(&mapping.alias) else {
            return;
        };
        classification.remove(&mapping.alias);

        match records.get_mut(&mapping.actual_name) {
            Some(existing) => {
                for file in aliased.imported_from {
                    existing.add_importer(file);
                }
                existing.imported_from.sort();
            }
            None => {
                let mut renamed = aliased;
                renamed.name = mapping.actual_name.clone();
                records.insert(mapping.actual_name.clone(), renamed);
            }
        }

        if !classification.contains(&mapping.actual_name) {
            let extra = classifier
                .classify([mapping.actual_name.as_str()], tree, roots, &self.reporter)
                .await;
            classification.merge(extra);
        }
        debug!(alias = %mapping.alias, actual = %mapping.actual_name, "Folded import alias");
    }
}
