use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::error::Result;
use crate::models::{Confidence, ResolvedVersion, VersionSource};
use crate::tree::SourceTree;

static VERSION_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?(?:\+[0-9A-Za-z.\-]+)?$").unwrap()
});

static VERSION_CONSTANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bversion['"]?\s*[:=]\s*['"](\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?)['"]"#).unwrap()
});

const PNPM_STORE: &str = ".pnpm";
const CONSTANT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "tsx"];

/// Fast detector for version evidence already spelled out in the tree
#[async_trait]
pub trait UnifiedDetector: Send + Sync {
    /// Versions for whichever of `names` the tree reveals directly
    async fn detect(&self, tree: &SourceTree, names: &[String]) -> Result<BTreeMap<String, ResolvedVersion>>;
}

/// Split a `name@1.2.3` path segment into name and version.
///
/// pnpm peer suffixes (`_react@18.2.0`, `(react@18.2.0)`) are dropped and the
/// version must be a full `major.minor.patch`.
pub fn parse_version_tag(segment: &str) -> Option<(&str, &str)> {
    let at = segment.get(1..)?.find('@')? + 1;
    let name = &segment[..at];
    let rest = &segment[at + 1..];
    let version = &rest[..rest.find(['_', '(']).unwrap_or(rest.len())];
    if name.is_empty() || !VERSION_TAG.is_match(version) {
        return None;
    }
    Some((name, version))
}

#[derive(Debug, Clone)]
struct PathTag {
    version: String,
    source: VersionSource,
    depth: usize,
}

impl PathTag {
    fn outranks(&self, other: &PathTag) -> bool {
        let rank = |t: &PathTag| (t.source != VersionSource::LockfilePath, t.depth);
        rank(self) < rank(other)
    }
}

/// Default detector: pnpm store paths, `name@version` path segments and
/// agreeing version constants inside a package's own files
#[derive(Debug, Default, Clone, Copy)]
pub struct PathVersionDetector;

impl PathVersionDetector {
    /// Creates a new PathVersionDetector
    pub fn new() -> Self {
        PathVersionDetector
    }

    fn path_tags(path: &str) -> Vec<(String, PathTag)> {
        let segments: Vec<&str> = path.split('/').collect();
        let depth = segments.len();
        let mut tags = Vec::new();
        let mut i = 0;
        while i < segments.len() {
            let segment = segments[i];
            if segment == PNPM_STORE {
                if let Some((name, version)) = segments.get(i + 1).and_then(|s| parse_version_tag(s)) {
                    tags.push((
                        name.replace('+', "/"),
                        PathTag {
                            version: version.to_string(),
                            source: VersionSource::LockfilePath,
                            depth,
                        },
                    ));
                }
                i += 2;
                continue;
            }

            let scoped = segment.starts_with('@') && !segment[1..].contains('@');
            let tagged = if scoped {
                segments
                    .get(i + 1)
                    .and_then(|s| parse_version_tag(s))
                    .map(|(name, version)| (format!("{segment}/{name}"), version))
            } else {
                parse_version_tag(segment).map(|(name, version)| (name.to_string(), version))
            };
            if let Some((name, version)) = tagged {
                tags.push((
                    name,
                    PathTag {
                        version: version.to_string(),
                        source: VersionSource::SourcemapPath,
                        depth,
                    },
                ));
                i += if scoped { 2 } else { 1 };
                continue;
            }
            i += 1;
        }
        tags
    }

    fn constant_version(tree: &SourceTree, name: &str) -> Option<String> {
        let mut found: BTreeSet<&str> = BTreeSet::new();
        for file in tree.package_files(name) {
            let is_script = file
                .path
                .rsplit_once('.')
                .is_some_and(|(_, ext)| CONSTANT_EXTENSIONS.contains(&ext));
            if !is_script {
                continue;
            }
            for caps in VERSION_CONSTANT.captures_iter(&file.content) {
                if let Some(m) = caps.get(1) {
                    found.insert(m.as_str());
                }
            }
        }
        match found.len() {
            1 => found.into_iter().next().map(str::to_string),
            0 => None,
            n => {
                debug!(package = %name, constants = n, "Disagreeing version constants ignored");
                None
            }
        }
    }
}

#[async_trait]
impl UnifiedDetector for PathVersionDetector {
    async fn detect(&self, tree: &SourceTree, names: &[String]) -> Result<BTreeMap<String, ResolvedVersion>> {
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();

        let mut best: BTreeMap<String, PathTag> = BTreeMap::new();
        for path in tree.paths() {
            for (name, tag) in Self::path_tags(path) {
                if !wanted.contains(name.as_str()) {
                    continue;
                }
                match best.get(&name) {
                    Some(current) if !tag.outranks(current) => {}
                    _ => {
                        best.insert(name, tag);
                    }
                }
            }
        }

        let mut resolved: BTreeMap<String, ResolvedVersion> = best
            .into_iter()
            .map(|(name, tag)| (name, ResolvedVersion::new(tag.version, Confidence::High, tag.source)))
            .collect();

        for name in names {
            if resolved.contains_key(name) {
                continue;
            }
            if let Some(version) = Self::constant_version(tree, name) {
                resolved.insert(
                    name.clone(),
                    ResolvedVersion::new(version, Confidence::Medium, VersionSource::VersionConstant),
                );
            }
        }
        Ok(resolved)
    }
}

/// Tier 1: delegates to a [`UnifiedDetector`]
pub struct UnifiedDetectorTier {
    detector: Arc<dyn UnifiedDetector>,
}

impl UnifiedDetectorTier {
    /// Wrap a detector
    pub fn new(detector: Arc<dyn UnifiedDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl VersionTier for UnifiedDetectorTier {
    fn kind(&self) -> TierKind {
        TierKind::UnifiedDetector
    }

    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult {
        match self.detector.detect(ctx.tree, pending).await {
            Ok(found) => found.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Unified detector failed, continuing without it");
                TierResult::default()
            }
        }
    }
}
