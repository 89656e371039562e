#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Dependency classification and version resolution
//!
//! Turns the bare import names found in source recovered from a deployed web
//! bundle into classified dependency records, each carrying a resolved
//! version with a confidence level and provenance, or an explicit "unknown".
//!
//! The pipeline:
//!
//! 1. collects imports from the application's own files
//! 2. detects in-tree workspace packages and classifies every name as
//!    internal or published
//! 3. folds bundler aliases (`foo` for `@scope/foo`) into their published names
//! 4. runs the resolution tiers in priority order; the first tier to
//!    produce a version for a package wins
//! 5. validates every resolved `name@version` against the registry

pub mod alias;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod imports;
pub mod models;
pub mod package_name;
pub mod peer;
pub mod pipeline;
pub mod progress;
pub mod range;
pub mod tiers;
pub mod tree;
pub mod validator;
pub mod workspace;

pub use alias::AliasResolver;
pub use cache::{cache_key, FileRunCache, MemoryRunCache, RunCache};
pub use classifier::DependencyClassifier;
pub use config::{ConfigLoader, FingerprintConfig, ResolverConfig};
pub use error::{ResolveError, Result};
pub use imports::{collect_imports, ImportExtractor, ImportIndex, RegexImportExtractor};
pub use models::{
    AliasEvidence, AliasMapping, Classification, ClassificationDetail, ClassificationReason,
    Confidence, DependencyRecord, KnownVersionFact, PeerCandidate, PeerInference,
    ResolvedVersion, SourceLocation, VersionSource, VersionStats,
};
pub use peer::{from_known_peers, from_peer_requirements, PeerInferenceEngine};
pub use pipeline::{PipelineOutput, VersionPipeline, VersionPipelineBuilder};
pub use progress::{Phase, ProgressEvent, ProgressReporter};
pub use range::{range_specificity, satisfies, RangeSpecificity};
pub use tiers::{
    resolve_first_match, BundleManifest, FingerprintOptions, FingerprintOracle,
    PathVersionDetector, TierContext, TierKind, TierResult, UnifiedDetector, VersionTier,
};
pub use tree::{FileOrigin, RecoveredFile, SourceTree};
pub use validator::{ValidationReport, VersionValidator};
pub use workspace::{RootProvenance, WorkspaceRoot, WorkspaceRootDetector, WorkspaceRoots};
