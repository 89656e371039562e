//! Data models for dependency resolution

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Evidence strength attached to a resolved version.
///
/// Ordered so that `Exact > High > Medium > Low > Unverified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    /// Registry fallback; nothing in the bundle backs the version
    Unverified,
    /// Weak evidence, many candidates
    Low,
    /// Some evidence, a few candidates
    Medium,
    /// Strong evidence, single candidate
    High,
    /// Authoritative evidence (recovered manifest)
    Exact,
}

impl Confidence {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Unverified => "unverified",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    /// `package.json` recovered inside the third-party tree
    PackageManifest,
    /// License/version banner comment
    Banner,
    /// Version tag in a lockfile-style install path
    LockfilePath,
    /// Version constant embedded in the package's code
    VersionConstant,
    /// Version tag in a source-map source path
    SourcemapPath,
    /// Content fingerprint of mapped files
    Fingerprint,
    /// Content fingerprint of minified vendor chunks
    FingerprintMinified,
    /// Locally built package with build metadata in its version
    CustomBuild,
    /// Peer-dependency inference
    PeerDep,
    /// Registry `latest` fallback
    RegistryLatest,
}

impl VersionSource {
    /// Stable kebab-case label
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::PackageManifest => "package-manifest",
            VersionSource::Banner => "banner",
            VersionSource::LockfilePath => "lockfile-path",
            VersionSource::VersionConstant => "version-constant",
            VersionSource::SourcemapPath => "sourcemap-path",
            VersionSource::Fingerprint => "fingerprint",
            VersionSource::FingerprintMinified => "fingerprint-minified",
            VersionSource::CustomBuild => "custom-build",
            VersionSource::PeerDep => "peer-dep",
            VersionSource::RegistryLatest => "registry-latest",
        }
    }
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version produced by one resolution strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Resolved version string
    pub version: String,
    /// Evidence strength
    pub confidence: Confidence,
    /// Strategy that produced it
    pub source: VersionSource,
}

impl ResolvedVersion {
    /// Create a resolved version
    pub fn new(version: impl Into<String>, confidence: Confidence, source: VersionSource) -> Self {
        Self {
            version: version.into(),
            confidence,
            source,
        }
    }
}

/// One imported package name and what is known about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRecord {
    /// Package name, unique within a run
    pub name: String,
    /// Resolved version, if any
    pub version: Option<String>,
    /// Confidence of the resolved version
    pub confidence: Option<Confidence>,
    /// Provenance of the resolved version
    pub source: Option<VersionSource>,
    /// Internal (workspace or private registry) package
    pub is_private: bool,
    /// Files importing this package, in first-observed order
    pub imported_from: Vec<String>,
}

impl DependencyRecord {
    /// Create an unresolved record
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            confidence: None,
            source: None,
            is_private: false,
            imported_from: Vec::new(),
        }
    }

    /// Whether a version has been assigned
    pub fn is_resolved(&self) -> bool {
        self.version.is_some()
    }

    /// Record an importing file, keeping first-observed order
    pub fn add_importer(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.imported_from.contains(&path) {
            self.imported_from.push(path);
        }
    }

    /// Assign a version unless one is already set. Returns whether it applied.
    pub fn apply(&mut self, resolved: ResolvedVersion) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.replace(resolved);
        true
    }

    /// Overwrite the version unconditionally
    pub fn replace(&mut self, resolved: ResolvedVersion) {
        self.version = Some(resolved.version);
        self.confidence = Some(resolved.confidence);
        self.source = Some(resolved.source);
    }

    /// Reset to unresolved
    pub fn clear_version(&mut self) {
        self.version = None;
        self.confidence = None;
        self.source = None;
    }

    /// Read-only fact for peer inference, if this record qualifies
    pub fn known_fact(&self) -> Option<KnownVersionFact> {
        if self.is_private {
            return None;
        }
        let version = self.version.as_ref()?;
        Some(KnownVersionFact {
            name: self.name.clone(),
            version: version.clone(),
            confidence: self.confidence.unwrap_or(Confidence::Unverified),
        })
    }
}

/// A known version, as consumed by peer inference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownVersionFact {
    /// Package name
    pub name: String,
    /// Known version
    pub version: String,
    /// Confidence in the known version
    pub confidence: Confidence,
}

/// A candidate version considered during peer inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerCandidate {
    /// Candidate version of the unknown package
    pub version: String,
    /// Known package whose peer range matched
    pub matched_peer_name: String,
    /// The matching peer range
    pub peer_range: String,
    /// Ranking score (specificity for forward, satisfied ratio for reverse)
    pub specificity_score: f64,
}

/// Outcome of peer inference for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInference {
    /// Winning version
    pub version: String,
    /// Confidence of the winner
    pub confidence: Confidence,
    /// Always `peer-dep`
    pub source: VersionSource,
    /// Known package the inference leaned on
    pub inferred_from_peer_name: String,
    /// Peer range that matched
    pub peer_range: String,
    /// Best candidates in rank order, at most five
    pub top_candidate_versions: Vec<String>,
}

impl PeerInference {
    /// Convert to a tier result
    pub fn to_resolved(&self) -> ResolvedVersion {
        ResolvedVersion::new(self.version.clone(), self.confidence, self.source)
    }
}

/// Why a name was classified the way it was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationReason {
    /// Resolves to a package root inside the recovered tree
    Workspace,
    /// Installed under the third-party dir but not on the public registry
    PrivateRegistry,
    /// Published on the public registry
    Registry,
    /// Not published and no install evidence
    UnknownInternal,
    /// Registry could not be asked; assumed published
    UnknownExternal,
}

/// Where recovered sources for a name were seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceLocation {
    /// In the application's own tree
    OutsideDependencyTree,
    /// Under the third-party dependency dir
    InsideDependencyTree,
    /// No recovered file belongs to the name
    NoSource,
}

/// Classification of a single name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationDetail {
    /// Classification reason
    pub reason: ClassificationReason,
    /// Where sources were seen
    pub source_location: SourceLocation,
}

impl ClassificationDetail {
    /// Whether the name is treated as internal
    pub fn is_internal(&self) -> bool {
        matches!(
            self.reason,
            ClassificationReason::Workspace
                | ClassificationReason::PrivateRegistry
                | ClassificationReason::UnknownInternal
        )
    }
}

/// Partition of imported names into internal and external
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Published packages
    pub external: BTreeSet<String>,
    /// Workspace and private packages
    pub internal: BTreeSet<String>,
    /// Per-name details
    pub details: BTreeMap<String, ClassificationDetail>,
}

impl Classification {
    /// Record a name's classification
    pub fn insert(&mut self, name: impl Into<String>, detail: ClassificationDetail) {
        let name = name.into();
        if detail.is_internal() {
            self.external.remove(&name);
            self.internal.insert(name.clone());
        } else {
            self.internal.remove(&name);
            self.external.insert(name.clone());
        }
        self.details.insert(name, detail);
    }

    /// Merge another classification into this one
    pub fn merge(&mut self, other: Classification) {
        for (name, detail) in other.details {
            self.insert(name, detail);
        }
    }

    /// Forget a name's classification
    pub fn remove(&mut self, name: &str) -> Option<ClassificationDetail> {
        self.external.remove(name);
        self.internal.remove(name);
        self.details.remove(name)
    }

    /// Whether a name has been classified
    pub fn contains(&self, name: &str) -> bool {
        self.details.contains_key(name)
    }

    /// Whether a name is internal
    pub fn is_internal(&self, name: &str) -> bool {
        self.internal.contains(name)
    }
}

/// One piece of evidence for an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasEvidence {
    /// Application file importing the alias
    pub importing_file: String,
    /// A recovered file of the actual package
    pub resolved_path: String,
}

/// An import name that is a rewritten alias of a published package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasMapping {
    /// Name as imported
    pub alias: String,
    /// Published package name
    pub actual_name: String,
    /// Supporting evidence
    pub evidence: Vec<AliasEvidence>,
}

/// Summary of resolution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    /// Number of records
    pub total: usize,
    /// Records with a version
    pub resolved: usize,
    /// External records without a version
    pub unresolved: usize,
    /// Internal records
    pub private: usize,
    /// Resolved records per source
    pub by_source: BTreeMap<VersionSource, usize>,
    /// Resolved records per confidence
    pub by_confidence: BTreeMap<Confidence, usize>,
}

impl VersionStats {
    /// Compute statistics from a record set
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a DependencyRecord>,
    {
        let mut stats = VersionStats::default();
        for record in records {
            stats.total += 1;
            if record.is_private {
                stats.private += 1;
                continue;
            }
            if !record.is_resolved() {
                stats.unresolved += 1;
                continue;
            }
            stats.resolved += 1;
            if let Some(source) = record.source {
                *stats.by_source.entry(source).or_default() += 1;
            }
            if let Some(confidence) = record.confidence {
                *stats.by_confidence.entry(confidence).or_default() += 1;
            }
        }
        stats
    }
}
