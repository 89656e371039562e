//! Import alias detection
//!
//! Bundler aliases can rewrite `@scope/foo` to a bare `foo` import. When an
//! imported name matches no installed package but is the unscoped name of
//! exactly one scoped installed package, the import is treated as an alias.
//! Workspace roots are in-tree code and never aliases.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::imports::ImportIndex;
use crate::models::{AliasEvidence, AliasMapping};
use crate::package_name::{is_scoped, unscoped};
use crate::tree::SourceTree;
use crate::workspace::WorkspaceRoots;

/// Detects aliased imports
#[derive(Debug, Default, Clone, Copy)]
pub struct AliasResolver;

impl AliasResolver {
    /// Creates a new AliasResolver
    pub fn new() -> Self {
        AliasResolver
    }

    /// Aliases among the imported names, ordered by alias
    pub fn detect(
        &self,
        tree: &SourceTree,
        imports: &ImportIndex,
        roots: &WorkspaceRoots,
    ) -> Vec<AliasMapping> {
        let installed = tree.third_party_packages();

        let mut by_suffix: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for name in installed.iter().filter(|n| is_scoped(n)) {
            by_suffix.entry(unscoped(name)).or_default().insert(name.as_str());
        }

        let mut aliases = Vec::new();
        for (alias, importers) in &imports.by_name {
            if installed.contains(alias) {
                continue;
            }
            if roots.contains(alias) {
                debug!(alias = %alias, "Workspace root is not an alias");
                continue;
            }
            let Some(candidates) = by_suffix.get(alias.as_str()) else {
                continue;
            };
            if candidates.len() != 1 {
                debug!(alias = %alias, candidates = candidates.len(), "Ambiguous alias skipped");
                continue;
            }
            let Some(actual) = candidates.first().copied() else {
                continue;
            };
            let Some(example) = tree.package_files(actual).first().map(|f| f.path.clone()) else {
                continue;
            };

            aliases.push(AliasMapping {
                alias: alias.clone(),
                actual_name: actual.to_string(),
                evidence: importers
                    .iter()
                    .map(|file| AliasEvidence {
                        importing_file: file.clone(),
                        resolved_path: example.clone(),
                    })
                    .collect(),
            });
        }

        debug!(aliases = aliases.len(), "Detected import aliases");
        aliases
    }
}
