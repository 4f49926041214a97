//! Deduplication, clustering, and ranking for news curation.
//!
//! This crate provides:
//! - A flat cosine-similarity [`VectorIndex`] with on-disk persistence
//! - Near-duplicate clustering and multi-day story-chain detection ([`Deduplicator`])
//! - Five-factor scoring ([`Scorer`]) and primary/secondary selection
//! - A [`CurationPipeline`] running the whole pass with an optional history index
//!
//! Embeddings come from an [`EmbeddingProvider`]. [`HashingEmbedder`] works
//! offline; enable the `openai` feature for `OpenAIEmbeddingProvider`.

pub mod config;
pub mod dedupe;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod index;
pub mod item;
mod linkage;
pub mod normalize;
pub mod observer;
pub mod pipeline;
pub mod score;
pub mod select;
mod similarity;

#[cfg(feature = "openai")]
pub mod openai;

pub use config::{
    CurationConfig, CurationConfigBuilder, DedupeConfig, RankingWeights, RunMode, ScoringConfig,
    SelectionConfig, TimeWindows,
};
pub use dedupe::{DedupeMode, Deduplicator, chain_id};
pub use embedding::EmbeddingProvider;
pub use error::{CurateError, Result};
pub use hashing::HashingEmbedder;
pub use index::{IndexHit, IndexMetadata, VectorIndex, build_index};
pub use item::{NewsItem, RankedStory, item_id, ranking_order, representative_order};
pub use normalize::normalize_items;
pub use observer::{CurationObserver, NoopObserver, TracingObserver};
pub use pipeline::{Curation, CurationPipeline, CurationPipelineBuilder, RunStats};
pub use score::{EngagementSignal, NeutralEngagement, Scorer, recency_score, uniqueness_score};
pub use select::{
    Selection, StoryChain, filter_by_time_window, group_story_chains, select, select_secondary,
    select_top,
};

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
