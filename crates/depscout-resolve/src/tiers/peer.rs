use async_trait::async_trait;

use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::peer::PeerInferenceEngine;

/// Tier 5: peer dependency inference fed by every resolved, non-private record
pub struct PeerDependencyTier {
    engine: PeerInferenceEngine,
}

impl PeerDependencyTier {
    /// Wrap an inference engine
    pub fn new(engine: PeerInferenceEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl VersionTier for PeerDependencyTier {
    fn kind(&self) -> TierKind {
        TierKind::PeerDependency
    }

    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult {
        let known = ctx.known_versions();
        let inferences = self.engine.infer(pending, &known, ctx.reporter).await;
        TierResult {
            resolved: inferences
                .iter()
                .map(|(name, inference)| (name.clone(), inference.to_resolved()))
                .collect(),
            peer_inferences: inferences,
        }
    }
}
