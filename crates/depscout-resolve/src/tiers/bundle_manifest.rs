use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::unified::parse_version_tag;
use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::models::{Confidence, ResolvedVersion, VersionSource};

/// File list of the overall extraction (source-map sources, CDN URLs)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Recorded paths and URLs
    pub entries: Vec<String>,
}

impl BundleManifest {
    /// Create a manifest from entries
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `{"files": [...]}` or a bare array of strings.
    ///
    /// Anything else is treated as absent. Non-string entries are skipped.
    pub fn parse(json: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed bundle manifest");
                return None;
            }
        };
        let list = match &value {
            Value::Array(items) => items,
            Value::Object(map) => map.get("files")?.as_array()?,
            _ => return None,
        };
        Some(Self::new(list.iter().filter_map(Value::as_str)))
    }

    /// `name -> version` tags found in the entries; a name tagged with
    /// conflicting versions is dropped
    pub fn version_tags(&self) -> BTreeMap<String, String> {
        let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in &self.entries {
            let path = entry.split(['?', '#']).next().unwrap_or(entry);
            let segments: Vec<&str> = path.split('/').collect();
            let mut i = 0;
            while i < segments.len() {
                let segment = segments[i];
                let scoped = segment.starts_with('@') && !segment[1..].contains('@');
                let tagged = if scoped {
                    segments
                        .get(i + 1)
                        .and_then(|s| parse_version_tag(s))
                        .map(|(name, version)| (format!("{segment}/{name}"), version))
                } else {
                    parse_version_tag(segment)
                        .map(|(name, version)| (name.replace('+', "/"), version))
                };
                i += 1;
                if let Some((name, version)) = tagged {
                    seen.entry(name).or_default().insert(version.to_string());
                    if scoped {
                        i += 1;
                    }
                }
            }
        }
        seen.into_iter()
            .filter(|(_, versions)| versions.len() == 1)
            .filter_map(|(name, versions)| versions.into_iter().next().map(|v| (name, v)))
            .collect()
    }
}

/// Tier 6: path version tags from the bundle manifest
pub struct BundleManifestTier {
    tags: BTreeMap<String, String>,
}

impl BundleManifestTier {
    /// Create the tier from a parsed manifest
    pub fn new(manifest: &BundleManifest) -> Self {
        Self {
            tags: manifest.version_tags(),
        }
    }
}

#[async_trait]
impl VersionTier for BundleManifestTier {
    fn kind(&self) -> TierKind {
        TierKind::BundleManifest
    }

    async fn resolve(&self, pending: &[String], _ctx: &TierContext<'_>) -> TierResult {
        pending
            .iter()
            .filter_map(|name| {
                self.tags.get(name).map(|version| {
                    (
                        name.clone(),
                        ResolvedVersion::new(version.clone(), Confidence::Medium, VersionSource::SourcemapPath),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shapes() {
        let obj = BundleManifest::parse(r#"{"files": ["a.js", 3, "b.js"]}"#).unwrap();
        assert_eq!(obj.entries, vec!["a.js", "b.js"]);
        let arr = BundleManifest::parse(r#"["x.js"]"#).unwrap();
        assert_eq!(arr.entries, vec!["x.js"]);
        assert!(BundleManifest::parse("{oops").is_none());
        assert!(BundleManifest::parse(r#"{"other": []}"#).is_none());
        assert!(BundleManifest::parse("42").is_none());
    }

    #[test]
    fn test_version_tags_from_urls_and_paths() {
        let manifest = BundleManifest::new([
            "https://unpkg.com/react@18.2.0/umd/react.production.min.js",
            "https://cdn.jsdelivr.net/npm/@popperjs/core@2.11.8/dist/umd/popper.min.js?v=1",
            "node_modules/.pnpm/@vue+shared@3.3.4/node_modules/@vue/shared/index.js",
            "https://cdn.example.com/dup@1.0.0/a.js",
            "https://cdn.example.com/dup@2.0.0/a.js",
        ]);
        let tags = manifest.version_tags();
        assert_eq!(tags["react"], "18.2.0");
        assert_eq!(tags["@popperjs/core"], "2.11.8");
        assert_eq!(tags["@vue/shared"], "3.3.4");
        assert!(!tags.contains_key("dup"));
    }
}
