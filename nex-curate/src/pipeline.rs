//! Curation pipeline orchestrator.
//!
//! The [`CurationPipeline`] runs one curation pass over a batch of ingested
//! items:
//!
//! normalize → time-window filter → embed (once) → history filter →
//! deduplicate → score → select → group story chains
//!
//! # Example
//!
//! ```rust,ignore
//! use nex_curate::{CurationConfig, CurationPipeline, HashingEmbedder, RunMode};
//!
//! let mut pipeline = CurationPipeline::builder()
//!     .config(CurationConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbedder::new(384)?))
//!     .build()?;
//!
//! let curation = pipeline.run(items, RunMode::Daily).await?;
//! for story in &curation.top {
//!     println!("{:.3} {}", story.score, story.news_item.title);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{CurationConfig, RunMode};
use crate::dedupe::Deduplicator;
use crate::embedding::EmbeddingProvider;
use crate::error::{CurateError, Result};
use crate::index::{IndexMetadata, VectorIndex};
use crate::item::{NewsItem, RankedStory};
use crate::normalize::normalize_items;
use crate::observer::{CurationObserver, NoopObserver};
use crate::score::{EngagementSignal, NeutralEngagement, Scorer};
use crate::select::{StoryChain, filter_by_time_window, group_story_chains, select};

/// Counts describing what a run did at each stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStats {
    pub input: usize,
    pub normalized: usize,
    pub in_window: usize,
    pub history_filtered: usize,
    pub deduplicated: usize,
    pub chains: usize,
    pub top: usize,
    pub secondary: usize,
}

/// The outcome of one curation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Curation {
    pub mode: RunMode,
    pub generated_at: DateTime<Utc>,
    /// Every surviving story in ranking order.
    pub ranked: Vec<RankedStory>,
    pub top: Vec<RankedStory>,
    pub secondary: Vec<RankedStory>,
    /// Story chains among the selected stories. Empty for daily runs.
    pub chains: Vec<StoryChain>,
    pub stats: RunStats,
}

/// Orchestrates deduplication, scoring, and selection. Construct one via
/// [`CurationPipeline::builder()`].
pub struct CurationPipeline {
    config: CurationConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    observer: Arc<dyn CurationObserver>,
    engagement_signal: Arc<dyn EngagementSignal>,
    history: Option<VectorIndex>,
}

impl CurationPipeline {
    /// Create a new [`CurationPipelineBuilder`].
    pub fn builder() -> CurationPipelineBuilder {
        CurationPipelineBuilder::default()
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// The index of stories covered by earlier runs, if one is attached.
    pub fn history(&self) -> Option<&VectorIndex> {
        self.history.as_ref()
    }

    /// Detach the history index, e.g. to persist it.
    pub fn take_history(&mut self) -> Option<VectorIndex> {
        self.history.take()
    }

    /// Run one curation pass against the current wall clock.
    pub async fn run(&mut self, items: Vec<NewsItem>, mode: RunMode) -> Result<Curation> {
        self.run_at(items, mode, Utc::now()).await
    }

    /// Run one curation pass as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CurateError::EmbeddingProviderFailure`] if embedding fails;
    /// nothing is appended to the history index in that case.
    pub async fn run_at(
        &mut self,
        items: Vec<NewsItem>,
        mode: RunMode,
        now: DateTime<Utc>,
    ) -> Result<Curation> {
        let mut stats = RunStats { input: items.len(), ..RunStats::default() };
        info!(mode = ?mode, items = items.len(), "starting curation run");

        let items = normalize_items(items);
        stats.normalized = items.len();

        let items = if self.config.filter_to_window {
            filter_by_time_window(items, self.config.time_windows.hours(mode), now)
        } else {
            items
        };
        stats.in_window = items.len();

        let deduplicator =
            Deduplicator::new(self.embedding_provider.clone(), self.config.dedupe.clone())?
                .with_observer(self.observer.clone());
        let embeddings = deduplicator.embed(&items).await?;

        let (items, embeddings) = self.filter_history(items, embeddings)?;
        stats.history_filtered = stats.in_window - items.len();

        // Normalization leaves one item per id, so a survivor's id finds its vector.
        let vector_of: HashMap<String, usize> =
            items.iter().enumerate().map(|(position, item)| (item.id.clone(), position)).collect();

        let kept = deduplicator.deduplicate_with_embeddings(items, &embeddings, mode.into())?;
        stats.deduplicated = kept.len();

        let scorer = Scorer::new(self.config.scoring(mode))?
            .with_engagement(self.engagement_signal.clone());
        let ranked = scorer.rank_at(kept, now);
        self.observer.on_ranked(&ranked);

        let selection = select(&ranked, &self.config.selection);
        stats.top = selection.top.len();
        stats.secondary = selection.secondary.len();
        self.observer.on_selected(stats.top, stats.secondary);

        let chains = if mode.detects_story_chains() {
            let selected: Vec<RankedStory> =
                selection.top.iter().chain(&selection.secondary).cloned().collect();
            group_story_chains(&selected)
        } else {
            Vec::new()
        };
        stats.chains = chains.len();

        if let Some(history) = self.history.as_mut() {
            let (vectors, metadata): (Vec<Vec<f32>>, Vec<IndexMetadata>) = ranked
                .iter()
                .filter_map(|s| {
                    let &i = vector_of.get(s.id())?;
                    Some((embeddings[i].clone(), IndexMetadata::from(&s.news_item)))
                })
                .unzip();
            history.add(&vectors, metadata)?;
            debug!(added = vectors.len(), total = history.size(), "updated history index");
        }

        info!(
            deduplicated = stats.deduplicated,
            top = stats.top,
            secondary = stats.secondary,
            chains = stats.chains,
            "curation run complete"
        );

        Ok(Curation {
            mode,
            generated_at: now,
            ranked,
            top: selection.top,
            secondary: selection.secondary,
            chains,
            stats,
        })
    }

    /// Drop items whose closest history entry is a duplicate.
    fn filter_history(
        &self,
        items: Vec<NewsItem>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(Vec<NewsItem>, Vec<Vec<f32>>)> {
        let Some(history) = self.history.as_ref().filter(|h| !h.is_empty()) else {
            return Ok((items, embeddings));
        };
        let threshold = self.config.dedupe.duplicate_threshold as f32;

        let mut kept_items = Vec::with_capacity(items.len());
        let mut kept_vectors = Vec::with_capacity(embeddings.len());
        for (item, embedding) in items.into_iter().zip(embeddings) {
            match history.search(&embedding, 1, Some(threshold))?.first() {
                Some(hit) => self.observer.on_history_filtered(&item, hit.similarity),
                None => {
                    kept_items.push(item);
                    kept_vectors.push(embedding);
                }
            }
        }
        Ok((kept_items, kept_vectors))
    }
}

/// Builder for constructing a [`CurationPipeline`].
///
/// `config` and `embedding_provider` are required. Call
/// [`build()`](CurationPipelineBuilder::build) to validate and produce the pipeline.
#[derive(Default)]
pub struct CurationPipelineBuilder {
    config: Option<CurationConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    observer: Option<Arc<dyn CurationObserver>>,
    engagement_signal: Option<Arc<dyn EngagementSignal>>,
    history: Option<VectorIndex>,
}

impl CurationPipelineBuilder {
    /// Set the run configuration.
    pub fn config(mut self, config: CurationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set an observer for curation decisions. Defaults to [`NoopObserver`].
    pub fn observer(mut self, observer: Arc<dyn CurationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Set the engagement signal. Defaults to [`NeutralEngagement`].
    pub fn engagement_signal(mut self, signal: Arc<dyn EngagementSignal>) -> Self {
        self.engagement_signal = Some(signal);
        self
    }

    /// Attach an index of stories covered by previous runs.
    pub fn history(mut self, history: VectorIndex) -> Self {
        self.history = Some(history);
        self
    }

    /// Build the [`CurationPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`] if a required field is
    /// missing or the config is invalid, and [`CurateError::DimensionMismatch`]
    /// if the history index does not match the provider's dimension.
    pub fn build(self) -> Result<CurationPipeline> {
        let config = self
            .config
            .ok_or_else(|| CurateError::ConfigurationError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            CurateError::ConfigurationError("embedding_provider is required".to_string())
        })?;

        if let Some(history) = &self.history {
            if history.dimension() != embedding_provider.dimensions() {
                error!(
                    index = history.dimension(),
                    provider = embedding_provider.dimensions(),
                    "history index dimension does not match embedding provider"
                );
                return Err(CurateError::DimensionMismatch {
                    expected: embedding_provider.dimensions(),
                    actual: history.dimension(),
                });
            }
        }

        Ok(CurationPipeline {
            config,
            embedding_provider,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            engagement_signal: self
                .engagement_signal
                .unwrap_or_else(|| Arc::new(NeutralEngagement)),
            history: self.history,
        })
    }
}
