//! Hooks reporting curation decisions to the caller.
//!
//! Every method has a no-op default, so an observer only implements what it
//! cares about. The engines call these in addition to their own `tracing`
//! events.

use tracing::{debug, info};

use crate::item::{NewsItem, RankedStory};

/// Receives progress and decisions from the curation engines.
pub trait CurationObserver: Send + Sync {
    /// A deduplication pass reduced `input` items to `output`.
    fn on_deduplicated(&self, _input: usize, _output: usize) {}

    /// A cluster of `size > 1` items collapsed into `representative`.
    fn on_cluster(&self, _representative: &NewsItem, _size: usize) {}

    /// A story chain with `members` surviving items was identified.
    fn on_chain(&self, _chain_id: &str, _members: usize) {}

    /// Scoring finished; `stories` is in ranking order.
    fn on_ranked(&self, _stories: &[RankedStory]) {}

    /// Selection produced lists of the given lengths.
    fn on_selected(&self, _top: usize, _secondary: usize) {}

    /// `item` was dropped because an earlier run already covered it.
    fn on_history_filtered(&self, _item: &NewsItem, _similarity: f32) {}
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CurationObserver for NoopObserver {}

/// An observer that forwards decisions to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CurationObserver for TracingObserver {
    fn on_deduplicated(&self, input: usize, output: usize) {
        info!(input, output, removed = input.saturating_sub(output), "deduplicated items");
    }

    fn on_cluster(&self, representative: &NewsItem, size: usize) {
        debug!(url = %representative.url, size, "collapsed duplicate cluster");
    }

    fn on_chain(&self, chain_id: &str, members: usize) {
        info!(chain_id, members, "story chain detected");
    }

    fn on_ranked(&self, stories: &[RankedStory]) {
        let top_score = stories.first().map(|s| s.score);
        info!(count = stories.len(), top_score = ?top_score, "ranked stories");
    }

    fn on_selected(&self, top: usize, secondary: usize) {
        info!(top, secondary, "selected stories");
    }

    fn on_history_filtered(&self, item: &NewsItem, similarity: f32) {
        debug!(url = %item.url, similarity, "already covered by a previous run");
    }
}
