//! Recovered source tree

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::package_name::{is_third_party_path, third_party_package};

/// How a file was recovered from the bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileOrigin {
    /// Reconstructed from a source map entry
    #[default]
    SourceMap,
    /// Minified vendor chunk that never had a source map
    VendorChunk,
}

/// A single recovered file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredFile {
    /// Normalised relative path (forward slashes)
    pub path: String,
    /// File contents
    #[serde(default)]
    pub content: String,
    /// Recovery origin
    #[serde(default)]
    pub origin: FileOrigin,
}

impl RecoveredFile {
    /// A source-mapped file
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            content: content.into(),
            origin: FileOrigin::SourceMap,
        }
    }

    /// A minified vendor chunk
    pub fn vendor_chunk(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: FileOrigin::VendorChunk,
            ..Self::new(path, content)
        }
    }
}

/// Normalise separators and strip leading `./` and `/`
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.to_string()
}

/// The reconstructed file tree, ordered by path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTree {
    files: BTreeMap<String, RecoveredFile>,
    /// Directory name holding installed third-party packages
    #[serde(default = "default_third_party_dir")]
    third_party_dir: String,
}

fn default_third_party_dir() -> String {
    crate::package_name::DEFAULT_THIRD_PARTY_DIR.to_string()
}

impl SourceTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            third_party_dir: default_third_party_dir(),
        }
    }

    /// Use a different third-party directory name
    pub fn with_third_party_dir(mut self, dir: impl Into<String>) -> Self {
        self.third_party_dir = dir.into();
        self
    }

    /// Build a tree from files
    pub fn from_files<I: IntoIterator<Item = RecoveredFile>>(files: I) -> Self {
        let mut tree = Self::new();
        for file in files {
            tree.insert(file);
        }
        tree
    }

    /// Add or replace a file
    pub fn insert(&mut self, file: RecoveredFile) {
        self.files.insert(file.path.clone(), file);
    }

    /// Third-party directory name
    pub fn third_party_dir(&self) -> &str {
        &self.third_party_dir
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a file by path
    pub fn get(&self, path: &str) -> Option<&RecoveredFile> {
        self.files.get(path)
    }

    /// All files in path order
    pub fn files(&self) -> impl Iterator<Item = &RecoveredFile> {
        self.files.values()
    }

    /// All paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Files outside the third-party dir
    pub fn application_files(&self) -> impl Iterator<Item = &RecoveredFile> {
        self.files
            .values()
            .filter(move |f| !is_third_party_path(&f.path, &self.third_party_dir))
    }

    /// Files owned by an installed package, shallowest install first
    pub fn package_files(&self, name: &str) -> Vec<&RecoveredFile> {
        let dir = self.third_party_dir.as_str();
        let mut owned: Vec<&RecoveredFile> = self
            .files
            .values()
            .filter(|f| third_party_package(&f.path, dir).as_deref() == Some(name))
            .collect();
        owned.sort_by_key(|f| crate::package_name::third_party_depth(&f.path, dir));
        owned
    }

    /// Names of every package with files under the third-party dir
    pub fn third_party_packages(&self) -> std::collections::BTreeSet<String> {
        self.files
            .keys()
            .filter_map(|p| third_party_package(p, &self.third_party_dir))
            .collect()
    }

    /// Stable content hash over paths, origins and contents
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.third_party_dir.as_bytes());
        for file in self.files.values() {
            hasher.update([0u8]);
            hasher.update(file.path.as_bytes());
            hasher.update([0u8]);
            hasher.update([file.origin as u8]);
            hasher.update(file.content.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl Default for SourceTree {
    fn default() -> Self {
        Self::new()
    }
}
