//! Version resolution tiers
//!
//! Each tier is one strategy for assigning versions to unresolved packages.
//! [`resolve_first_match`] runs an ordered list of tiers; a package keeps the
//! first version any tier gives it.

mod banner;
mod bundle_manifest;
mod fingerprint;
mod latest;
mod manifest;
mod peer;
mod unified;

pub use banner::BannerTier;
pub use bundle_manifest::{BundleManifest, BundleManifestTier};
pub use fingerprint::{FingerprintOptions, FingerprintOracle, FingerprintTier};
pub use latest::RegistryLatestTier;
pub use manifest::RecoveredManifestTier;
pub use peer::PeerDependencyTier;
pub use unified::{parse_version_tag, PathVersionDetector, UnifiedDetector, UnifiedDetectorTier};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{DependencyRecord, KnownVersionFact, PeerInference, ResolvedVersion};
use crate::progress::ProgressReporter;
use crate::tree::SourceTree;

/// Identity of a tier, in default priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierKind {
    /// Path tags and version constants
    UnifiedDetector,
    /// `package.json` recovered under the third-party dir
    RecoveredManifest,
    /// License/version banners
    Banner,
    /// Content similarity against published versions
    Fingerprint,
    /// Peer dependency inference
    PeerDependency,
    /// Path tags in the extraction's bundle manifest
    BundleManifest,
    /// Registry `latest` fallback
    RegistryLatest,
}

impl TierKind {
    /// Stable kebab-case label
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::UnifiedDetector => "unified-detector",
            TierKind::RecoveredManifest => "recovered-manifest",
            TierKind::Banner => "banner",
            TierKind::Fingerprint => "fingerprint",
            TierKind::PeerDependency => "peer-dependency",
            TierKind::BundleManifest => "bundle-manifest",
            TierKind::RegistryLatest => "registry-latest",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view a tier resolves against
pub struct TierContext<'a> {
    /// The recovered tree
    pub tree: &'a SourceTree,
    /// Every record, including ones resolved by earlier tiers
    pub records: &'a BTreeMap<String, DependencyRecord>,
    /// Facts supplied by the caller before the run
    pub seed_facts: &'a [KnownVersionFact],
    /// Per-item progress sink
    pub reporter: &'a ProgressReporter,
}

impl TierContext<'_> {
    /// Known versions for peer inference: resolved non-private records,
    /// falling back to caller-supplied facts for names without one
    pub fn known_versions(&self) -> BTreeMap<String, KnownVersionFact> {
        let mut known: BTreeMap<String, KnownVersionFact> = self
            .seed_facts
            .iter()
            .map(|fact| (fact.name.clone(), fact.clone()))
            .collect();
        for fact in self.records.values().filter_map(DependencyRecord::known_fact) {
            known.insert(fact.name.clone(), fact);
        }
        known
    }
}

/// What one tier produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierResult {
    /// Versions by package name
    pub resolved: BTreeMap<String, ResolvedVersion>,
    /// Peer inference details for packages resolved by peer inference
    pub peer_inferences: BTreeMap<String, PeerInference>,
}

impl TierResult {
    /// Number of packages resolved
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl FromIterator<(String, ResolvedVersion)> for TierResult {
    fn from_iter<I: IntoIterator<Item = (String, ResolvedVersion)>>(iter: I) -> Self {
        Self {
            resolved: iter.into_iter().collect(),
            peer_inferences: BTreeMap::new(),
        }
    }
}

/// One version resolution strategy
#[async_trait]
pub trait VersionTier: Send + Sync {
    /// Which tier this is
    fn kind(&self) -> TierKind;

    /// Resolve what it can of `pending`. Names not in `pending` are ignored
    /// by the driver. Per-package failures yield no entry, never an error.
    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult;
}

/// Outcome of running an ordered tier list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// Packages each tier resolved, in run order
    pub applied: Vec<(TierKind, usize)>,
    /// Peer inference details for records resolved by the peer tier
    pub peer_inferences: BTreeMap<String, PeerInference>,
}

fn pending_names(records: &BTreeMap<String, DependencyRecord>) -> Vec<String> {
    records
        .values()
        .filter(|r| !r.is_private && !r.is_resolved())
        .map(|r| r.name.clone())
        .collect()
}

/// Run `tiers` in order against `records`.
///
/// A tier only sees packages that are still unresolved and not private, and
/// starts after the previous tier has fully settled. The first version
/// assigned to a record is never overwritten here.
pub async fn resolve_first_match(
    tiers: &[Box<dyn VersionTier>],
    records: &mut BTreeMap<String, DependencyRecord>,
    tree: &SourceTree,
    seed_facts: &[KnownVersionFact],
    reporter: &ProgressReporter,
) -> ResolutionReport {
    let mut report = ResolutionReport::default();

    for tier in tiers {
        let kind = tier.kind();
        let pending = pending_names(records);
        if pending.is_empty() {
            debug!(tier = %kind, "Every package resolved, skipping remaining tiers");
            break;
        }

        let result = {
            let ctx = TierContext {
                tree,
                records: &*records,
                seed_facts,
                reporter,
            };
            tier.resolve(&pending, &ctx).await
        };

        let mut applied = 0usize;
        for (name, resolved) in result.resolved {
            let Some(record) = records.get_mut(&name) else {
                continue;
            };
            if record.is_private || !record.apply(resolved) {
                continue;
            }
            applied += 1;
            if let Some(inference) = result.peer_inferences.get(&name) {
                report.peer_inferences.insert(name, inference.clone());
            }
        }

        info!(tier = %kind, pending = pending.len(), resolved = applied, "Tier settled");
        report.applied.push((kind, applied));
    }

    report
}
