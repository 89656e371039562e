//! Workspace package root detection
//!
//! Heuristically finds packages whose sources live in the recovered tree
//! itself. Passes run from strongest to weakest evidence and later passes
//! only fill names the earlier ones left open. A false positive only costs
//! a missed version lookup, so the heuristics lean towards "internal".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::package_name::{is_third_party_path, is_valid_package_name};
use crate::tree::SourceTree;

const MANIFEST_FILE: &str = "package.json";
const ENTRY_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];

/// Evidence a workspace root was detected from, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootProvenance {
    /// `<root>/package.json`
    Manifest,
    /// `<root>/src/index.<ext>`
    SrcIndex,
    /// top-level `<root>/index.<ext>`
    DirectIndex,
    /// `<root>/src/...` with a single candidate root
    SrcDirectory,
    /// `<parent>/<root>/index.<ext>` with a single candidate root
    SubdirectoryIndex,
    /// parent directory of detected package roots
    ParentDirectory,
}

/// A detected in-tree package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRoot {
    /// Root directory, relative to the tree
    pub path: String,
    /// How it was detected
    pub provenance: RootProvenance,
}

/// Package name to workspace root, immutable once detected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRoots {
    roots: BTreeMap<String, WorkspaceRoot>,
}

impl WorkspaceRoots {
    /// Whether a name resolves to an in-tree package
    pub fn contains(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Root for a name
    pub fn get(&self, name: &str) -> Option<&WorkspaceRoot> {
        self.roots.get(name)
    }

    /// Number of detected roots
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether nothing was detected
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Iterate name and root
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkspaceRoot)> {
        self.roots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `name -> path` view
    pub fn paths(&self) -> BTreeMap<String, String> {
        self.roots
            .iter()
            .map(|(k, v)| (k.clone(), v.path.clone()))
            .collect()
    }

    fn fill(&mut self, name: &str, path: &str, provenance: RootProvenance) -> bool {
        if self.roots.contains_key(name) || !is_valid_package_name(name) {
            return false;
        }
        self.roots.insert(
            name.to_string(),
            WorkspaceRoot {
                path: path.to_string(),
                provenance,
            },
        );
        true
    }
}

/// Detects workspace packages from recovered paths
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkspaceRootDetector;

impl WorkspaceRootDetector {
    /// Creates a new WorkspaceRootDetector
    pub fn new() -> Self {
        WorkspaceRootDetector
    }

    /// Run every detection pass over the tree
    pub fn detect(&self, tree: &SourceTree) -> WorkspaceRoots {
        let third_party_dir = tree.third_party_dir();
        let files: Vec<(&str, &str)> = tree
            .files()
            .filter(|f| !is_third_party_path(&f.path, third_party_dir))
            .map(|f| (f.path.as_str(), f.content.as_str()))
            .collect();

        let mut roots = WorkspaceRoots::default();
        self.manifest_pass(&files, &mut roots);
        self.index_pass(&files, &mut roots);
        self.src_directory_pass(&files, &mut roots);
        self.subdirectory_index_pass(&files, &mut roots);
        self.parent_promotion_pass(&mut roots);

        debug!(roots = roots.len(), "Detected workspace package roots");
        roots
    }

    /// Pass 1: directories holding a recovered manifest
    fn manifest_pass(&self, files: &[(&str, &str)], roots: &mut WorkspaceRoots) {
        for (path, content) in files {
            let Some(dir) = path.strip_suffix(MANIFEST_FILE).and_then(|d| d.strip_suffix('/'))
            else {
                continue;
            };
            if dir.is_empty() {
                continue;
            }
            roots.fill(basename(dir), dir, RootProvenance::Manifest);
            if let Some(declared) = manifest_name(content) {
                roots.fill(&declared, dir, RootProvenance::Manifest);
            }
        }
    }

    /// Pass 2: `<name>/src/index.*` anywhere, then top-level `<name>/index.*`
    fn index_pass(&self, files: &[(&str, &str)], roots: &mut WorkspaceRoots) {
        for (path, _) in files {
            let segments: Vec<&str> = path.split('/').collect();
            let n = segments.len();
            if n >= 3 && segments[n - 2] == "src" && is_entry_file(segments[n - 1]) {
                let root = segments[..n - 2].join("/");
                roots.fill(segments[n - 3], &root, RootProvenance::SrcIndex);
            }
        }
        for (path, _) in files {
            let segments: Vec<&str> = path.split('/').collect();
            if segments.len() == 2 && segments[0] != "src" && is_entry_file(segments[1]) {
                roots.fill(segments[0], segments[0], RootProvenance::DirectIndex);
            }
        }
    }

    /// Pass 3: `<name>/src/...`, adopted only when the name has one candidate root
    fn src_directory_pass(&self, files: &[(&str, &str)], roots: &mut WorkspaceRoots) {
        let mut candidates: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (path, _) in files {
            let segments: Vec<&str> = path.split('/').collect();
            for i in 1..segments.len().saturating_sub(1) {
                if segments[i] == "src" {
                    let name = segments[i - 1];
                    candidates
                        .entry(name)
                        .or_default()
                        .insert(segments[..i].join("/"));
                }
            }
        }
        adopt_unambiguous(candidates, roots, RootProvenance::SrcDirectory);
    }

    /// Pass 4: `<parent>/<name>/index.*`, adopted only when unambiguous
    fn subdirectory_index_pass(&self, files: &[(&str, &str)], roots: &mut WorkspaceRoots) {
        let mut candidates: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (path, _) in files {
            let segments: Vec<&str> = path.split('/').collect();
            let n = segments.len();
            if n < 3 || !is_entry_file(segments[n - 1]) {
                continue;
            }
            let name = segments[n - 2];
            if name == "src" || roots.contains(name) {
                continue;
            }
            candidates
                .entry(name)
                .or_default()
                .insert(segments[..n - 1].join("/"));
        }
        adopt_unambiguous(candidates, roots, RootProvenance::SubdirectoryIndex);
    }

    /// Pass 4b: promote a detected root's parent directory when it looks like
    /// a package of its own (hyphenated name, or several child packages).
    fn parent_promotion_pass(&self, roots: &mut WorkspaceRoots) {
        let mut children: BTreeMap<String, usize> = BTreeMap::new();
        for (_, root) in roots.iter() {
            if let Some((parent, _)) = root.path.rsplit_once('/') {
                *children.entry(parent.to_string()).or_default() += 1;
            }
        }

        for (parent_path, count) in children {
            let name = basename(&parent_path);
            if name == "src" || roots.contains(name) {
                continue;
            }
            if name.contains('-') || count >= 2 {
                roots.fill(name, &parent_path, RootProvenance::ParentDirectory);
            }
        }
    }
}

fn adopt_unambiguous(
    candidates: BTreeMap<&str, BTreeSet<String>>,
    roots: &mut WorkspaceRoots,
    provenance: RootProvenance,
) {
    for (name, paths) in candidates {
        if paths.len() != 1 {
            continue;
        }
        if let Some(path) = paths.into_iter().next() {
            roots.fill(name, &path, provenance);
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_entry_file(file: &str) -> bool {
    match file.split_once('.') {
        Some(("index", ext)) => ENTRY_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

fn manifest_name(content: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    value.get("name")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::RecoveredFile;

    fn detect(paths: &[&str]) -> WorkspaceRoots {
        let tree = SourceTree::from_files(paths.iter().map(|p| RecoveredFile::new(*p, "")));
        WorkspaceRootDetector::new().detect(&tree)
    }

    #[test]
    fn test_src_index_root() {
        let roots = detect(&["navigation/site-kit/src/index.ts"]);
        let root = roots.get("site-kit").unwrap();
        assert_eq!(root.path, "navigation/site-kit");
        assert_eq!(root.provenance, RootProvenance::SrcIndex);
    }

    #[test]
    fn test_manifest_root_uses_basename_and_declared_name() {
        let tree = SourceTree::from_files([RecoveredFile::new(
            "packages/ui/package.json",
            r#"{"name":"@acme/ui","version":"0.0.0"}"#,
        )]);
        let roots = WorkspaceRootDetector::new().detect(&tree);
        assert_eq!(roots.get("ui").unwrap().provenance, RootProvenance::Manifest);
        assert_eq!(roots.get("@acme/ui").unwrap().path, "packages/ui");
    }

    #[test]
    fn test_manifest_beats_weaker_evidence() {
        let roots = detect(&["libs/core/package.json", "other/core/src/index.ts"]);
        assert_eq!(roots.get("core").unwrap().path, "libs/core");
    }

    #[test]
    fn test_third_party_paths_are_ignored() {
        let roots = detect(&["node_modules/react/package.json", "node_modules/react/index.js"]);
        assert!(!roots.contains("react"));
    }

    #[test]
    fn test_direct_index() {
        let roots = detect(&["shared/index.js", "src/index.js"]);
        assert_eq!(roots.get("shared").unwrap().provenance, RootProvenance::DirectIndex);
        assert!(!roots.contains("src"));
    }

    #[test]
    fn test_src_directory_requires_single_candidate() {
        let roots = detect(&[
            "apps/web/src/main.tsx",
            "apps/web/src/App.tsx",
            "a/widgets/src/x.ts",
            "b/widgets/src/y.ts",
        ]);
        assert_eq!(roots.get("web").unwrap().provenance, RootProvenance::SrcDirectory);
        assert!(!roots.contains("widgets"));
    }

    #[test]
    fn test_subdirectory_index_and_parent_promotion() {
        let roots = detect(&[
            "design-system/button/index.ts",
            "design-system/icons/index.ts",
            "x/charts/index.ts",
            "y/charts/index.ts",
        ]);
        assert_eq!(
            roots.get("button").unwrap().provenance,
            RootProvenance::SubdirectoryIndex
        );
        assert!(roots.contains("icons"));
        assert!(!roots.contains("charts"));
        let parent = roots.get("design-system").unwrap();
        assert_eq!(parent.path, "design-system");
        assert_eq!(parent.provenance, RootProvenance::ParentDirectory);
    }

    #[test]
    fn test_hyphenated_parent_with_single_child() {
        let roots = detect(&["web/site-kit/header/index.ts"]);
        assert!(roots.contains("header"));
        assert_eq!(roots.get("site-kit").unwrap().path, "web/site-kit");
    }
}
