use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::models::{Confidence, ResolvedVersion, VersionSource};
use crate::package_name::path_within_package;
use crate::tree::SourceTree;

const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Deserialize)]
struct RecoveredManifest {
    name: Option<String>,
    version: Option<String>,
}

/// Tier 2: `package.json` files recovered verbatim under the third-party dir
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveredManifestTier;

impl RecoveredManifestTier {
    /// Creates a new RecoveredManifestTier
    pub fn new() -> Self {
        RecoveredManifestTier
    }

    /// Version declared by the shallowest readable manifest of `name`
    pub fn manifest_version(tree: &SourceTree, name: &str) -> Option<ResolvedVersion> {
        let dir = tree.third_party_dir();
        for file in tree.package_files(name) {
            if path_within_package(&file.path, name, dir) != Some(MANIFEST_FILE) {
                continue;
            }
            let manifest: RecoveredManifest = match serde_json::from_str(&file.content) {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %file.path, error = %e, "Ignoring malformed recovered manifest");
                    continue;
                }
            };
            if manifest.name.as_deref() != Some(name) {
                continue;
            }
            let Some(version) = manifest.version.filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            return Some(if version.contains('+') {
                ResolvedVersion::new(version, Confidence::High, VersionSource::CustomBuild)
            } else {
                ResolvedVersion::new(version, Confidence::Exact, VersionSource::PackageManifest)
            });
        }
        None
    }
}

#[async_trait]
impl VersionTier for RecoveredManifestTier {
    fn kind(&self) -> TierKind {
        TierKind::RecoveredManifest
    }

    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult {
        pending
            .iter()
            .filter_map(|name| Self::manifest_version(ctx.tree, name).map(|v| (name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::RecoveredFile;

    #[test]
    fn test_shallowest_manifest_wins() {
        let tree = SourceTree::from_files([
            RecoveredFile::new(
                "node_modules/react/package.json",
                r#"{"name":"react","version":"18.2.0"}"#,
            ),
            RecoveredFile::new(
                "node_modules/legacy/node_modules/react/package.json",
                r#"{"name":"react","version":"16.14.0"}"#,
            ),
        ]);
        let v = RecoveredManifestTier::manifest_version(&tree, "react").unwrap();
        assert_eq!(v.version, "18.2.0");
        assert_eq!(v.confidence, Confidence::Exact);
        assert_eq!(v.source, VersionSource::PackageManifest);
    }

    #[test]
    fn test_build_metadata_is_custom_build() {
        let tree = SourceTree::from_files([RecoveredFile::new(
            "node_modules/@corp/widgets/package.json",
            r#"{"name":"@corp/widgets","version":"2.1.0+build.7"}"#,
        )]);
        let v = RecoveredManifestTier::manifest_version(&tree, "@corp/widgets").unwrap();
        assert_eq!(v.source, VersionSource::CustomBuild);
        assert_eq!(v.confidence, Confidence::High);
    }

    #[test]
    fn test_malformed_or_mismatched_manifests_are_skipped() {
        let tree = SourceTree::from_files([
            RecoveredFile::new("node_modules/a/package.json", "{ not json"),
            RecoveredFile::new("node_modules/b/package.json", r#"{"name":"other","version":"1.0.0"}"#),
            RecoveredFile::new("node_modules/c/lib/package.json", r#"{"name":"c","version":"1.0.0"}"#),
        ]);
        assert!(RecoveredManifestTier::manifest_version(&tree, "a").is_none());
        assert!(RecoveredManifestTier::manifest_version(&tree, "b").is_none());
        assert!(RecoveredManifestTier::manifest_version(&tree, "c").is_none());
    }
}
