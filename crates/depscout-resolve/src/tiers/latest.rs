use std::sync::Arc;

use async_trait::async_trait;
use depscout_registry::RegistryClient;
use tracing::warn;

use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::models::{Confidence, ResolvedVersion, VersionSource};
use crate::progress::{run_bounded, Phase};

/// Tier 7: the registry's `latest` tag. Opt-in; always `unverified`.
pub struct RegistryLatestTier {
    registry: Arc<dyn RegistryClient>,
    concurrency: usize,
}

impl RegistryLatestTier {
    /// Create the tier
    pub fn new(registry: Arc<dyn RegistryClient>, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency,
        }
    }
}

#[async_trait]
impl VersionTier for RegistryLatestTier {
    fn kind(&self) -> TierKind {
        TierKind::RegistryLatest
    }

    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult {
        let registry = &self.registry;
        let fetched = run_bounded(
            pending.to_vec(),
            self.concurrency,
            Phase::Tier(TierKind::RegistryLatest),
            ctx.reporter,
            String::clone,
            |name| async move { registry.latest_version(&name).await },
        )
        .await;

        let mut result = TierResult::default();
        for (name, latest) in fetched {
            match latest {
                Ok(Some(version)) => {
                    result.resolved.insert(
                        name,
                        ResolvedVersion::new(version, Confidence::Unverified, VersionSource::RegistryLatest),
                    );
                }
                Ok(None) => {}
                Err(e) => warn!(package = %name, error = %e, "Failed to fetch latest version"),
            }
        }
        result
    }
}
