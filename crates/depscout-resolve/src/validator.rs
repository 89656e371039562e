//! Closing `name@version` validation
//!
//! Catches misattributed versions (a sub-dependency's banner or fingerprint
//! pinned to a co-bundled package) by confirming every resolved pair exists
//! on the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use depscout_registry::RegistryClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{Confidence, DependencyRecord, ResolvedVersion, VersionSource};
use crate::progress::{run_bounded, Phase, ProgressReporter};

/// What happened to each validated record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Pairs checked
    pub checked: usize,
    /// Records whose version was swapped for `latest`
    pub replaced: Vec<String>,
    /// Records whose version was cleared
    pub cleared: Vec<String>,
}

#[derive(Debug)]
enum Verdict {
    Valid,
    Replace(String),
    Clear,
}

/// Confirms resolved versions exist on the registry
pub struct VersionValidator {
    registry: Arc<dyn RegistryClient>,
    concurrency: usize,
}

impl VersionValidator {
    /// Create a validator backed by a (cache-first) registry client
    pub fn new(registry: Arc<dyn RegistryClient>, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency,
        }
    }

    async fn verdict(registry: &dyn RegistryClient, name: &str, version: &str) -> Verdict {
        match registry.version_exists(name, version).await {
            Ok(true) => Verdict::Valid,
            Err(e) => {
                warn!(package = %name, version = %version, error = %e, "Version check failed, keeping version");
                Verdict::Valid
            }
            Ok(false) => match registry.latest_version(name).await {
                Ok(Some(latest)) if latest != version => Verdict::Replace(latest),
                Ok(_) => Verdict::Clear,
                Err(e) => {
                    warn!(package = %name, error = %e, "No replacement version obtainable");
                    Verdict::Clear
                }
            },
        }
    }

    /// Validate every resolved, non-private record in place
    pub async fn validate(
        &self,
        records: &mut BTreeMap<String, DependencyRecord>,
        reporter: &ProgressReporter,
    ) -> ValidationReport {
        let pairs: Vec<(String, String)> = records
            .values()
            .filter(|r| !r.is_private)
            .filter_map(|r| r.version.clone().map(|v| (r.name.clone(), v)))
            .collect();

        let registry = self.registry.as_ref();
        let verdicts = run_bounded(
            pairs,
            self.concurrency,
            Phase::Validation,
            reporter,
            |(name, _)| name.clone(),
            |(name, version)| async move { Self::verdict(registry, &name, &version).await },
        )
        .await;

        let mut report = ValidationReport {
            checked: verdicts.len(),
            ..ValidationReport::default()
        };
        for ((name, version), verdict) in verdicts {
            let Some(record) = records.get_mut(&name) else {
                continue;
            };
            match verdict {
                Verdict::Valid => {}
                Verdict::Replace(latest) => {
                    warn!(package = %name, invalid = %version, replacement = %latest, "Replacing unpublished version with latest");
                    record.replace(ResolvedVersion::new(
                        latest,
                        Confidence::Unverified,
                        VersionSource::RegistryLatest,
                    ));
                    report.replaced.push(name);
                }
                Verdict::Clear => {
                    warn!(package = %name, invalid = %version, "Clearing unpublished version");
                    record.clear_version();
                    report.cleared.push(name);
                }
            }
        }
        report.replaced.sort();
        report.cleared.sort();

        info!(
            checked = report.checked,
            replaced = report.replaced.len(),
            cleared = report.cleared.len(),
            "Validated resolved versions"
        );
        report
    }
}
