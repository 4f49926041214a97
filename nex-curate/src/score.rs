//! Multi-factor scoring of deduplicated news items.
//!
//! Each item gets five component scores in `[0, 1]` and a weighted composite:
//!
//! | Component   | Source                                                   |
//! |-------------|----------------------------------------------------------|
//! | recency     | 1.0 inside the time window, half-life decay beyond it     |
//! | credibility | `engagement["credibility"]`, 0.5 when absent              |
//! | engagement  | an [`EngagementSignal`], [`NeutralEngagement`] by default |
//! | uniqueness  | `1 / (1 + duplicates)`                                    |
//! | relevance   | keyword hit fraction × 2, capped at 1                     |
//!
//! The composite is not clamped; with the default weights it stays in `[0, 1]`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::item::{NewsItem, RankedStory, ranking_order};

/// Fraction of the window used as the half-life past its end.
const DECAY_RATE: f64 = 0.1;

/// Relevance when no keywords are configured.
const NEUTRAL_RELEVANCE: f64 = 0.5;

/// A source of engagement scores in `[0, 1]`.
///
/// Implement this to feed reader metrics (votes, comments, shares) into
/// ranking without changing the [`Scorer`].
pub trait EngagementSignal: Send + Sync {
    fn score(&self, item: &NewsItem) -> f64;
}

/// Scores every item 0.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralEngagement;

impl EngagementSignal for NeutralEngagement {
    fn score(&self, _item: &NewsItem) -> f64 {
        0.5
    }
}

/// Recency for an item `age_hours` old against a window of `window_hours`.
pub fn recency_score(age_hours: f64, window_hours: f64) -> f64 {
    let age = age_hours.max(0.0);
    if age <= window_hours {
        return 1.0;
    }
    let excess = age - window_hours;
    0.5f64.powf(excess / (window_hours * DECAY_RATE)).clamp(0.0, 1.0)
}

/// Uniqueness for an item that absorbed `duplicates` others.
pub fn uniqueness_score(duplicates: usize) -> f64 {
    1.0 / (1.0 + duplicates as f64)
}

/// Computes component and composite scores and ranks items.
pub struct Scorer {
    config: ScoringConfig,
    keywords: Vec<String>,
    engagement: Arc<dyn EngagementSignal>,
}

impl Scorer {
    /// Create a scorer with [`NeutralEngagement`].
    ///
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`](crate::CurateError::ConfigurationError)
    /// if a weight is negative or the window is not positive.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        let keywords = config
            .relevance_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Ok(Self { config, keywords, engagement: Arc::new(NeutralEngagement) })
    }

    /// Replace the engagement signal.
    pub fn with_engagement(mut self, signal: Arc<dyn EngagementSignal>) -> Self {
        self.engagement = signal;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    fn relevance(&self, item: &NewsItem) -> f64 {
        if self.keywords.is_empty() {
            return NEUTRAL_RELEVANCE;
        }
        let text = item.embedding_text().to_lowercase();
        let matches = self.keywords.iter().filter(|k| text.contains(k.as_str())).count();
        (matches as f64 / self.keywords.len() as f64 * 2.0).min(1.0)
    }

    /// Score `item` as of `now`.
    pub fn score_at(&self, item: NewsItem, now: DateTime<Utc>) -> RankedStory {
        let age_hours = (now - item.published_at).num_milliseconds() as f64 / 3_600_000.0;
        let recency = recency_score(age_hours, self.config.time_window_hours);
        let credibility = item.credibility();
        let engagement = self.engagement.score(&item).clamp(0.0, 1.0);
        let uniqueness = uniqueness_score(item.duplicates.len());
        let relevance = self.relevance(&item);

        let w = &self.config.weights;
        let score = w.recency * recency
            + w.credibility * credibility
            + w.engagement * engagement
            + w.uniqueness * uniqueness
            + w.relevance * relevance;

        RankedStory {
            news_item: item,
            score,
            recency,
            credibility,
            engagement,
            uniqueness,
            relevance,
            summary: None,
        }
    }

    /// Score `item` against the current wall clock.
    pub fn score(&self, item: NewsItem) -> RankedStory {
        self.score_at(item, Utc::now())
    }

    /// Score all items as of `now` and sort them into ranking order.
    pub fn rank_at(&self, items: Vec<NewsItem>, now: DateTime<Utc>) -> Vec<RankedStory> {
        let mut ranked: Vec<RankedStory> =
            items.into_iter().map(|item| self.score_at(item, now)).collect();
        ranked.sort_by(ranking_order);
        debug!(count = ranked.len(), "ranked items");
        ranked
    }

    /// Score and sort against the current wall clock.
    pub fn rank(&self, items: Vec<NewsItem>) -> Vec<RankedStory> {
        self.rank_at(items, Utc::now())
    }
}
