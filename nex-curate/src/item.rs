//! News items and their ranked form.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Engagement key holding the source credibility in `[0, 1]`.
pub const CREDIBILITY_KEY: &str = "credibility";

/// Credibility assumed for items whose source did not report one.
pub const DEFAULT_CREDIBILITY: f64 = 0.5;

/// Derive the stable item identifier for a URL.
///
/// The identifier is the first 16 hex characters of the SHA-256 digest of the
/// URL, so two items with the same URL always share an id.
pub fn item_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{digest:x}").chars().take(16).collect()
}

/// An ingested, normalized article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    /// Stable hash of `url`, see [`item_id`].
    pub id: String,
    /// Ingestion channel, e.g. `rss` or `arxiv`.
    #[serde(default)]
    pub source: String,
    /// Human-readable publication name.
    pub source_name: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub summary_raw: String,
    /// Bounded excerpt used for embedding and relevance scoring.
    #[serde(default)]
    pub content_snippet: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Named engagement signals. `credibility` lives here.
    #[serde(default)]
    pub engagement: BTreeMap<String, f64>,
    /// URLs absorbed into this item during clustering, in input order.
    #[serde(default)]
    pub duplicates: Vec<String>,
    /// Links this item to a developing multi-day story.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_chain_id: Option<String>,
}

impl NewsItem {
    /// Create an item with its id derived from `url` and empty content fields.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        source_name: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        Self {
            id: item_id(&url),
            source: String::new(),
            source_name: source_name.into(),
            title: title.into(),
            url,
            published_at,
            author: None,
            summary_raw: String::new(),
            content_snippet: String::new(),
            tags: Vec::new(),
            engagement: BTreeMap::new(),
            duplicates: Vec::new(),
            story_chain_id: None,
        }
    }

    /// Set the content snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.content_snippet = snippet.into();
        self
    }

    /// Set the source credibility.
    pub fn with_credibility(mut self, credibility: f64) -> Self {
        self.engagement.insert(CREDIBILITY_KEY.to_string(), credibility);
        self
    }

    /// Source credibility clamped to `[0, 1]`, or [`DEFAULT_CREDIBILITY`] when
    /// missing or not a number.
    pub fn credibility(&self) -> f64 {
        match self.engagement.get(CREDIBILITY_KEY) {
            Some(value) if value.is_finite() => value.clamp(0.0, 1.0),
            _ => DEFAULT_CREDIBILITY,
        }
    }

    /// The text handed to the embedding provider.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content_snippet)
    }
}

/// Representative preference: higher credibility, then more recent, then the
/// smaller URL. `Ordering::Less` means `a` is preferred.
///
/// The URL comparison makes this a total order, so the preferred item of a
/// set does not depend on the order the set was presented in.
pub fn representative_order(a: &NewsItem, b: &NewsItem) -> Ordering {
    b.credibility()
        .total_cmp(&a.credibility())
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.url.cmp(&b.url))
}

/// A news item plus its scoring outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedStory {
    pub news_item: NewsItem,
    /// Weighted composite of the five components.
    pub score: f64,
    pub recency: f64,
    pub credibility: f64,
    pub engagement: f64,
    pub uniqueness: f64,
    pub relevance: f64,
    /// Slot for the downstream summarizer's output. Never read by ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

impl RankedStory {
    pub fn id(&self) -> &str {
        &self.news_item.id
    }
}

/// Full ranking order: score descending, then the representative preference.
pub fn ranking_order(a: &RankedStory, b: &RankedStory) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| representative_order(&a.news_item, &b.news_item))
}
