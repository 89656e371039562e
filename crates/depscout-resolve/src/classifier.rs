//! Internal/external classification of imported names

use std::collections::BTreeSet;
use std::sync::Arc;

use depscout_registry::RegistryClient;
use tracing::{debug, warn};

use crate::models::{Classification, ClassificationDetail, ClassificationReason, SourceLocation};
use crate::progress::{run_bounded, Phase, ProgressReporter};
use crate::tree::SourceTree;
use crate::workspace::WorkspaceRoots;

/// Labels every imported name as internal or external
pub struct DependencyClassifier {
    registry: Arc<dyn RegistryClient>,
    concurrency: usize,
    registry_checks: bool,
}

impl DependencyClassifier {
    /// Create a classifier backed by a (cache-first) registry client
    pub fn new(registry: Arc<dyn RegistryClient>, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency,
            registry_checks: true,
        }
    }

    /// Skip registry lookups; unknown names are then assumed external
    pub fn without_registry_checks(mut self) -> Self {
        self.registry_checks = false;
        self
    }

    /// Classify `names` against the tree and its workspace roots
    pub async fn classify<I, S>(
        &self,
        names: I,
        tree: &SourceTree,
        roots: &WorkspaceRoots,
        reporter: &ProgressReporter,
    ) -> Classification
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let installed = tree.third_party_packages();
        let mut classification = Classification::default();
        let mut to_check: Vec<(String, SourceLocation)> = Vec::new();

        for name in names {
            let name = name.as_ref();
            if roots.contains(name) {
                classification.insert(
                    name,
                    ClassificationDetail {
                        reason: ClassificationReason::Workspace,
                        source_location: SourceLocation::OutsideDependencyTree,
                    },
                );
                continue;
            }
            to_check.push((name.to_string(), source_location(name, tree, &installed)));
        }

        if !self.registry_checks {
            for (name, location) in to_check {
                classification.insert(name, unknown_external(location));
            }
            return classification;
        }

        let registry = &self.registry;
        let checked = run_bounded(
            to_check,
            self.concurrency,
            Phase::Classification,
            reporter,
            |(name, _)| name.clone(),
            |(name, _)| async move { registry.package_exists(&name).await },
        )
        .await;

        for ((name, location), exists) in checked {
            let detail = match exists {
                Ok(true) => ClassificationDetail {
                    reason: ClassificationReason::Registry,
                    source_location: location,
                },
                Ok(false) => ClassificationDetail {
                    reason: if location == SourceLocation::InsideDependencyTree {
                        ClassificationReason::PrivateRegistry
                    } else {
                        ClassificationReason::UnknownInternal
                    },
                    source_location: location,
                },
                Err(e) => {
                    warn!(package = %name, error = %e, "Registry existence check failed, assuming external");
                    unknown_external(location)
                }
            };
            classification.insert(name, detail);
        }

        debug!(
            external = classification.external.len(),
            internal = classification.internal.len(),
            "Classified imported names"
        );
        classification
    }
}

fn unknown_external(location: SourceLocation) -> ClassificationDetail {
    ClassificationDetail {
        reason: ClassificationReason::UnknownExternal,
        source_location: location,
    }
}

fn source_location(name: &str, tree: &SourceTree, installed: &BTreeSet<String>) -> SourceLocation {
    if installed.contains(name) {
        return SourceLocation::InsideDependencyTree;
    }
    let needle = format!("/{name}/");
    if tree
        .application_files()
        .any(|f| format!("/{}", f.path).contains(&needle))
    {
        return SourceLocation::OutsideDependencyTree;
    }
    SourceLocation::NoSource
}
