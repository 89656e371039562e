//! Progress events and bounded fan-out
//!
//! Workers never touch shared state. Each batch is driven from the calling
//! task, which receives results in completion order, emits one progress
//! event per item and hands the results back for aggregation.

use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::tiers::TierKind;

/// Pipeline stage an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "phase", content = "tier")]
pub enum Phase {
    /// Registry existence checks
    Classification,
    /// A version resolution tier
    Tier(TierKind),
    /// Closing `name@version` validation
    Validation,
}

/// One item finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage
    pub phase: Phase,
    /// Items finished so far in this batch, including this one
    pub completed: usize,
    /// Items in this batch
    pub total: usize,
    /// Item label (usually a package name)
    pub item: String,
}

/// Sender side of the progress channel; a disabled reporter drops events
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// A reporter plus the receiver its events arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards events
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Send an event; a closed receiver is not an error
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Run `work` for every item with at most `limit` in flight.
///
/// Results come back in completion order and a progress event is emitted
/// for each item as soon as its result is in hand.
pub async fn run_bounded<T, R, F, Fut, L>(
    items: Vec<T>,
    limit: usize,
    phase: Phase,
    reporter: &ProgressReporter,
    label: L,
    work: F,
) -> Vec<(T, R)>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
    L: Fn(&T) -> String,
{
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut pending = stream::iter(items)
        .map(|item| {
            let fut = work(item.clone());
            async move { (item, fut.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((item, result)) = pending.next().await {
        reporter.emit(ProgressEvent {
            phase,
            completed: results.len() + 1,
            total,
            item: label(&item),
        });
        results.push((item, result));
    }
    results
}
