//! Typed registry metadata
//!
//! Only the parts of a registry document the resolver reads are modelled;
//! everything else in the packument is ignored on deserialisation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Peer-dependency declarations of one published version: package name to range
pub type PeerRanges = BTreeMap<String, String>;

/// Details of a single published version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDetail {
    /// Declared peer dependencies
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: PeerRanges,
}

impl VersionDetail {
    /// Version detail with the given peer ranges
    pub fn with_peers<I, K, V>(peers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            peer_dependencies: peers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// All published versions of one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Package name
    #[serde(default)]
    pub name: String,
    /// Distribution tags (`latest`, `next`, ...)
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
    /// Published versions keyed by version string
    #[serde(default)]
    pub versions: BTreeMap<String, VersionDetail>,
}

impl PackageMetadata {
    /// Create empty metadata for a package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a published version
    pub fn with_version(mut self, version: impl Into<String>, detail: VersionDetail) -> Self {
        self.versions.insert(version.into(), detail);
        self
    }

    /// The `latest` dist-tag, if published
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    /// Whether an exact version string was published
    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }
}
