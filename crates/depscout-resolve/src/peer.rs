//! Peer dependency inference
//!
//! Two strategies guess an unknown package's version from what is already
//! known about the packages it peers with:
//!
//! - **forward** (`from_peer_requirements`): prefer versions of the unknown
//!   package whose peer ranges pin a known version most narrowly
//! - **reverse** (`from_known_peers`): keep versions none of whose peer ranges
//!   contradict a known version, ranked by how many peers they cover
//!
//! Forward results always win; reverse only fills what forward left open.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use depscout_registry::{CachedRegistry, PackageMetadata};
use tracing::{debug, warn};

use crate::models::{Confidence, KnownVersionFact, PeerCandidate, PeerInference, VersionSource};
use crate::progress::{run_bounded, Phase, ProgressReporter};
use crate::range::{compare_version_strings, is_prerelease, range_specificity, satisfies, RangeSpecificity};
use crate::tiers::TierKind;

/// Maximum number of ranked candidates reported per package
pub const MAX_TOP_CANDIDATES: usize = 5;

/// Known versions keyed by package name
pub type KnownVersions = BTreeMap<String, KnownVersionFact>;

/// Confidence for a winning range of `specificity` shared by `tied` candidates
pub fn specificity_confidence(specificity: RangeSpecificity, tied: usize) -> Confidence {
    match specificity {
        RangeSpecificity::Exact if tied <= 1 => Confidence::Exact,
        RangeSpecificity::Exact => Confidence::High,
        RangeSpecificity::Patch if tied <= 1 => Confidence::High,
        RangeSpecificity::Patch | RangeSpecificity::Minor => Confidence::Medium,
        RangeSpecificity::Wide => Confidence::Low,
    }
}

fn survivor_confidence(survivors: usize) -> Confidence {
    match survivors {
        1 => Confidence::High,
        2..=3 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

fn rank(a: &PeerCandidate, b: &PeerCandidate) -> Ordering {
    b.specificity_score
        .partial_cmp(&a.specificity_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| compare_version_strings(&b.version, &a.version))
}

fn candidate_versions<'a>(
    metadata: &'a PackageMetadata,
    include_prereleases: bool,
) -> impl Iterator<Item = (&'a String, &'a depscout_registry::VersionDetail)> {
    metadata
        .versions
        .iter()
        .filter(move |(version, _)| include_prereleases || !is_prerelease(version))
}

fn into_inference(candidates: Vec<PeerCandidate>, confidence: Confidence) -> Option<PeerInference> {
    let winner = candidates.first()?;
    Some(PeerInference {
        version: winner.version.clone(),
        confidence,
        source: VersionSource::PeerDep,
        inferred_from_peer_name: winner.matched_peer_name.clone(),
        peer_range: winner.peer_range.clone(),
        top_candidate_versions: candidates
            .iter()
            .take(MAX_TOP_CANDIDATES)
            .map(|c| c.version.clone())
            .collect(),
    })
}

/// Forward inference over one package's published versions
pub fn from_peer_requirements(
    metadata: &PackageMetadata,
    known: &KnownVersions,
    include_prereleases: bool,
) -> Option<PeerInference> {
    let mut candidates: Vec<PeerCandidate> = Vec::new();

    for (version, detail) in candidate_versions(metadata, include_prereleases) {
        let mut best: Option<(RangeSpecificity, &String, &String)> = None;
        for (peer, range) in &detail.peer_dependencies {
            let Some(fact) = known.get(peer) else {
                continue;
            };
            if !satisfies(&fact.version, range) {
                continue;
            }
            let specificity = range_specificity(range);
            if best.map_or(true, |(s, _, _)| specificity > s) {
                best = Some((specificity, peer, range));
            }
        }
        if let Some((specificity, peer, range)) = best {
            candidates.push(PeerCandidate {
                version: version.clone(),
                matched_peer_name: peer.clone(),
                peer_range: range.clone(),
                specificity_score: f64::from(specificity.score()),
            });
        }
    }

    candidates.sort_by(rank);
    let top = candidates.first()?;
    let top_specificity = range_specificity(&top.peer_range);
    let tied = candidates
        .iter()
        .filter(|c| c.specificity_score == top.specificity_score)
        .count();
    into_inference(candidates, specificity_confidence(top_specificity, tied))
}

/// Reverse inference over one package's published versions
pub fn from_known_peers(
    metadata: &PackageMetadata,
    known: &KnownVersions,
    include_prereleases: bool,
) -> Option<PeerInference> {
    let mut candidates: Vec<PeerCandidate> = Vec::new();

    'versions: for (version, detail) in candidate_versions(metadata, include_prereleases) {
        let mut satisfied = 0usize;
        let mut provenance: Option<(&String, &String)> = None;
        for (peer, range) in &detail.peer_dependencies {
            let Some(fact) = known.get(peer) else {
                continue;
            };
            if !satisfies(&fact.version, range) {
                continue 'versions;
            }
            satisfied += 1;
            if provenance.is_none() {
                provenance = Some((peer, range));
            }
        }

        let Some((peer, range)) = provenance else {
            continue;
        };
        candidates.push(PeerCandidate {
            version: version.clone(),
            matched_peer_name: peer.clone(),
            peer_range: range.clone(),
            specificity_score: satisfied as f64 / detail.peer_dependencies.len().max(1) as f64,
        });
    }

    candidates.sort_by(rank);
    let confidence = survivor_confidence(candidates.len());
    into_inference(candidates, confidence)
}

/// Runs both strategies for a batch of unknown packages
pub struct PeerInferenceEngine {
    registry: Arc<CachedRegistry>,
    concurrency: usize,
    include_prereleases: bool,
}

impl PeerInferenceEngine {
    /// Create an engine reading metadata through the registry cache
    pub fn new(registry: Arc<CachedRegistry>, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency,
            include_prereleases: false,
        }
    }

    /// Also consider pre-release versions as candidates
    pub fn with_prereleases(mut self, include: bool) -> Self {
        self.include_prereleases = include;
        self
    }

    /// Infer versions for `unknown` packages from `known` ones
    pub async fn infer(
        &self,
        unknown: &[String],
        known: &KnownVersions,
        reporter: &ProgressReporter,
    ) -> BTreeMap<String, PeerInference> {
        if unknown.is_empty() || known.is_empty() {
            return BTreeMap::new();
        }

        let registry = &self.registry;
        let fetched = run_bounded(
            unknown.to_vec(),
            self.concurrency,
            Phase::Tier(TierKind::PeerDependency),
            reporter,
            String::clone,
            |name| async move { registry.shared_metadata(&name).await },
        )
        .await;

        let mut metadata: BTreeMap<String, Arc<PackageMetadata>> = BTreeMap::new();
        for (name, result) in fetched {
            match result {
                Ok(Some(meta)) => {
                    metadata.insert(name, meta);
                }
                Ok(None) => debug!(package = %name, "No registry metadata for peer inference"),
                Err(e) => warn!(package = %name, error = %e, "Failed to fetch metadata for peer inference"),
            }
        }

        let mut results = BTreeMap::new();
        for (name, meta) in &metadata {
            if let Some(inference) = from_peer_requirements(meta, known, self.include_prereleases) {
                results.insert(name.clone(), inference);
            }
        }
        let forward = results.len();
        for (name, meta) in &metadata {
            if results.contains_key(name) {
                continue;
            }
            if let Some(inference) = from_known_peers(meta, known, self.include_prereleases) {
                results.insert(name.clone(), inference);
            }
        }

        debug!(
            forward,
            reverse = results.len() - forward,
            "Peer inference settled"
        );
        results
    }
}
