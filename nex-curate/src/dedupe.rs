//! Near-duplicate clustering and story-chain detection.
//!
//! The [`Deduplicator`] reduces a batch of [`NewsItem`]s to one representative
//! per story. It runs in one of two modes:
//!
//! - [`DedupeMode::Standard`] clusters by average linkage over cosine
//!   distance. Each cluster keeps its preferred item (see
//!   [`representative_order`]) and records the others' URLs in `duplicates`.
//! - [`DedupeMode::Chains`] is used for week-long windows. Highly similar
//!   items published on the same day are absorbed as duplicates, while
//!   moderately similar items published on different days stay separate and
//!   share a `story_chain_id`.
//!
//! Both modes are deterministic for a fixed input and embedding provider.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::config::{DedupeConfig, RunMode};
use crate::embedding::EmbeddingProvider;
use crate::error::{CurateError, Result};
use crate::item::{NewsItem, representative_order};
use crate::linkage::average_linkage;
use crate::observer::{CurationObserver, NoopObserver};
use crate::similarity::{distance_for_similarity, l2_normalize, similarity_matrix};

/// Title characters that feed the story-chain identifier.
const CHAIN_TITLE_PREFIX: usize = 50;

/// Hex characters kept from the story-chain digest.
const CHAIN_ID_LEN: usize = 12;

/// Clustering strategy for one deduplication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupeMode {
    /// Average-linkage clustering at the duplicate threshold.
    #[default]
    Standard,
    /// Same-day duplicate removal plus multi-day story-chain linking.
    Chains,
}

impl From<RunMode> for DedupeMode {
    fn from(mode: RunMode) -> Self {
        if mode.detects_story_chains() { Self::Chains } else { Self::Standard }
    }
}

/// Collapses near-duplicate news items using an [`EmbeddingProvider`].
pub struct Deduplicator {
    provider: Arc<dyn EmbeddingProvider>,
    config: DedupeConfig,
    observer: Arc<dyn CurationObserver>,
}

impl Deduplicator {
    /// Create a deduplicator with validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`] if `config` is invalid.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: DedupeConfig) -> Result<Self> {
        config.validate()?;
        info!(
            duplicate_threshold = config.duplicate_threshold,
            chain_threshold = config.chain_threshold,
            provider = provider.name(),
            "initialized deduplicator"
        );
        Ok(Self { provider, config, observer: Arc::new(NoopObserver) })
    }

    /// Report clusters and chains to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn CurationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &DedupeConfig {
        &self.config
    }

    /// Embed every item's title and snippet with a single batch call.
    ///
    /// # Errors
    ///
    /// Returns [`CurateError::EmbeddingProviderFailure`] if the provider fails
    /// or returns the wrong number of vectors.
    pub async fn embed(&self, items: &[NewsItem]) -> Result<Vec<Vec<f32>>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = items.iter().map(NewsItem::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let name = self.provider.name().to_string();

        let embeddings = self.provider.embed_batch(&refs).await.map_err(|e| {
            error!(provider = %name, error = %e, "embedding failed during deduplication");
            match e {
                CurateError::EmbeddingProviderFailure { .. } => e,
                other => CurateError::provider(&name, other.to_string()),
            }
        })?;

        if embeddings.len() != items.len() {
            error!(provider = %name, actual = embeddings.len(), "wrong embedding count");
            return Err(CurateError::provider(
                name,
                format!("asked for {} embeddings, got {}", items.len(), embeddings.len()),
            ));
        }
        Ok(embeddings)
    }

    /// Embed `items` and collapse near-duplicates.
    ///
    /// An empty batch returns immediately without calling the provider. A
    /// provider failure aborts the whole pass.
    pub async fn deduplicate(
        &self,
        items: Vec<NewsItem>,
        mode: DedupeMode,
    ) -> Result<Vec<NewsItem>> {
        if items.is_empty() {
            return Ok(items);
        }
        let embeddings = self.embed(&items).await?;
        self.deduplicate_with_embeddings(items, &embeddings, mode)
    }

    /// Collapse near-duplicates using precomputed embeddings, one per item.
    ///
    /// # Errors
    ///
    /// [`CurateError::LengthMismatch`] if the counts differ and
    /// [`CurateError::DimensionMismatch`] if the vectors disagree in length.
    pub fn deduplicate_with_embeddings(
        &self,
        items: Vec<NewsItem>,
        embeddings: &[Vec<f32>],
        mode: DedupeMode,
    ) -> Result<Vec<NewsItem>> {
        if embeddings.len() != items.len() {
            return Err(CurateError::LengthMismatch {
                vectors: embeddings.len(),
                metadata: items.len(),
            });
        }
        if let Some(first) = embeddings.first() {
            if let Some(bad) = embeddings.iter().find(|v| v.len() != first.len()) {
                return Err(CurateError::DimensionMismatch {
                    expected: first.len(),
                    actual: bad.len(),
                });
            }
        }
        if items.is_empty() {
            return Ok(items);
        }

        let input = items.len();
        info!(items = input, mode = ?mode, "deduplicating");
        let unit: Vec<Vec<f32>> = embeddings.iter().map(|v| l2_normalize(v)).collect();
        let similarities = similarity_matrix(&unit);

        let kept = match mode {
            DedupeMode::Standard => self.cluster_standard(items, &similarities),
            DedupeMode::Chains => self.cluster_chains(items, &similarities),
        };

        info!(kept = kept.len(), duplicates = input - kept.len(), "deduplication complete");
        self.observer.on_deduplicated(input, kept.len());
        Ok(kept)
    }

    fn cluster_standard(&self, items: Vec<NewsItem>, similarities: &[Vec<f64>]) -> Vec<NewsItem> {
        let distances: Vec<Vec<f64>> = similarities
            .iter()
            .map(|row| row.iter().map(|&s| distance_for_similarity(s)).collect())
            .collect();
        let clusters =
            average_linkage(&distances, distance_for_similarity(self.config.duplicate_threshold));
        debug!(clusters = clusters.len(), items = items.len(), "found clusters");

        let groups = clusters.iter().map(|members| Group::resolve(&items, members)).collect();
        self.emit(items, groups, None)
    }

    fn cluster_chains(&self, items: Vec<NewsItem>, similarities: &[Vec<f64>]) -> Vec<NewsItem> {
        let n = items.len();
        let duplicate = self.config.duplicate_threshold;
        let chain = self.config.chain_threshold;

        let mut processed = vec![false; n];
        let mut links = DisjointSet::new(n);
        let mut survivor_of = vec![0usize; n];
        let mut groups = Vec::new();

        for i in 0..n {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let mut members = vec![i];

            for j in (i + 1)..n {
                if processed[j] {
                    continue;
                }
                let similarity = similarities[i][j];
                let days = days_apart(&items[i], &items[j]);

                if similarity >= duplicate && days == 0 {
                    debug!(similarity, url = %items[j].url, "same-day duplicate");
                    members.push(j);
                    processed[j] = true;
                    links.union(i, j);
                } else if similarity >= chain && similarity < duplicate && days > 0 {
                    debug!(similarity, days, url = %items[j].url, "story chain link");
                    links.union(i, j);
                }
            }

            let group = Group::resolve(&items, &members);
            for &member in &members {
                survivor_of[member] = group.representative;
            }
            groups.push(group);
        }

        // Survivors per linked component, founding survivor first.
        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut component_of_root: HashMap<usize, usize> = HashMap::new();
        for index in 0..n {
            let root = links.find(index);
            let slot = *component_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            let survivor = survivor_of[index];
            if !components[slot].contains(&survivor) {
                components[slot].push(survivor);
            }
        }

        let mut chain_of: HashMap<usize, String> = HashMap::new();
        let mut used = HashSet::new();
        for survivors in components.iter().filter(|s| s.len() > 1) {
            let id = unique_chain_id(&items[survivors[0]], &mut used);
            for &survivor in survivors {
                chain_of.insert(survivor, id.clone());
            }
            self.observer.on_chain(&id, survivors.len());
        }
        info!(chains = used.len(), "story chain detection complete");

        self.emit(items, groups, Some(&chain_of))
    }

    fn emit(
        &self,
        items: Vec<NewsItem>,
        groups: Vec<Group>,
        chain_of: Option<&HashMap<usize, String>>,
    ) -> Vec<NewsItem> {
        let mut slots: Vec<Option<NewsItem>> = items.into_iter().map(Some).collect();
        let mut kept = Vec::with_capacity(groups.len());
        for group in groups {
            let Some(mut item) = slots[group.representative].take() else { continue };
            item.duplicates = group.duplicates;
            // Chain mode owns the field; standard mode leaves it untouched.
            if let Some(chains) = chain_of {
                item.story_chain_id = chains.get(&group.representative).cloned();
            }
            if group.size > 1 {
                self.observer.on_cluster(&item, group.size);
            }
            kept.push(item);
        }
        kept
    }
}

/// One resolved cluster: who survives and which URLs it absorbed.
struct Group {
    representative: usize,
    duplicates: Vec<String>,
    size: usize,
}

impl Group {
    fn resolve(items: &[NewsItem], members: &[usize]) -> Self {
        let representative = members
            .iter()
            .copied()
            .min_by(|&a, &b| representative_order(&items[a], &items[b]))
            .unwrap_or_default();
        let own_url = &items[representative].url;
        let duplicates = members
            .iter()
            .filter(|&&m| m != representative)
            .map(|&m| items[m].url.clone())
            .filter(|url| url != own_url)
            .collect();
        Self { representative, duplicates, size: members.len() }
    }
}

/// Whole days between two publish times, ignoring direction.
fn days_apart(a: &NewsItem, b: &NewsItem) -> i64 {
    (a.published_at - b.published_at).num_days().abs()
}

/// Deterministic identifier keyed on a chain's founding item.
pub fn chain_id(founder: &NewsItem) -> String {
    let prefix: String = founder.title.chars().take(CHAIN_TITLE_PREFIX).collect();
    let key = format!("{prefix}\u{1f}{}\u{1f}{}", founder.published_at.to_rfc3339(), founder.url);
    let digest = Sha256::digest(key.as_bytes());
    format!("{digest:x}").chars().take(CHAIN_ID_LEN).collect()
}

fn unique_chain_id(founder: &NewsItem, used: &mut HashSet<String>) -> String {
    let base = chain_id(founder);
    let mut id = base.clone();
    let mut suffix = 1;
    while used.contains(&id) {
        suffix += 1;
        id = format!("{base}-{suffix}");
    }
    used.insert(id.clone());
    id
}

/// Union-find over item indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        // The smaller index roots the set.
        if ra < rb {
            self.parent[rb] = ra;
        } else if rb < ra {
            self.parent[ra] = rb;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::hashing::HashingEmbedder;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 9, 0, 0).unwrap()
    }

    fn item(url: &str, at: DateTime<Utc>) -> NewsItem {
        NewsItem::new(url, format!("Story at {url}"), "Wire", at)
    }

    fn dedup() -> Deduplicator {
        let provider = Arc::new(HashingEmbedder::new(16).unwrap());
        Deduplicator::new(provider, DedupeConfig::default()).unwrap()
    }

    /// Unit vector in the x/y plane with the given cosine to `[1, 0]`.
    fn at_cosine(s: f32) -> Vec<f32> {
        vec![s, (1.0 - s * s).sqrt()]
    }

    #[test]
    fn rejects_invalid_thresholds() {
        let provider = Arc::new(HashingEmbedder::new(16).unwrap());
        let config = DedupeConfig { duplicate_threshold: 0.7, chain_threshold: 0.8 };
        assert!(Deduplicator::new(provider, config).is_err());
    }

    #[test]
    fn standard_mode_absorbs_and_keeps_credible_item() {
        let items = vec![
            item("https://a", day(1)).with_credibility(0.6),
            item("https://b", day(1)).with_credibility(0.9),
            item("https://c", day(1)),
        ];
        let embeddings = vec![vec![1.0, 0.0], at_cosine(0.95), vec![0.0, 1.0]];
        let kept =
            dedup().deduplicate_with_embeddings(items, &embeddings, DedupeMode::Standard).unwrap();
        let urls: Vec<&str> = kept.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["https://b", "https://c"]);
        assert_eq!(kept[0].duplicates, ["https://a"]);
        assert!(kept[1].duplicates.is_empty());
    }

    #[test]
    fn same_url_is_never_its_own_duplicate() {
        let items = vec![item("https://same", day(1)), item("https://same", day(1))];
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let kept =
            dedup().deduplicate_with_embeddings(items, &embeddings, DedupeMode::Standard).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].duplicates.is_empty());
    }

    #[test]
    fn chain_mode_separates_days() {
        let items = vec![
            item("https://mon", day(3)),
            item("https://mon-copy", day(3) + Duration::hours(5)),
            item("https://thu", day(6)),
            item("https://other", day(4)),
        ];
        let embeddings = vec![vec![1.0, 0.0], at_cosine(0.9), at_cosine(0.8), vec![-1.0, 0.0]];
        let kept =
            dedup().deduplicate_with_embeddings(items, &embeddings, DedupeMode::Chains).unwrap();

        let urls: Vec<&str> = kept.iter().map(|i| i.url.as_str()).collect();
        // Equal credibility: the later same-day copy is preferred.
        assert_eq!(urls, ["https://mon-copy", "https://thu", "https://other"]);
        assert_eq!(kept[0].duplicates, ["https://mon"]);
        assert!(kept[0].story_chain_id.is_some());
        assert_eq!(kept[0].story_chain_id, kept[1].story_chain_id);
        assert!(kept[2].story_chain_id.is_none());
    }

    #[test]
    fn high_similarity_on_different_days_is_unrelated() {
        let items = vec![item("https://a", day(1)), item("https://b", day(5))];
        let embeddings = vec![vec![1.0, 0.0], at_cosine(0.99)];
        let kept =
            dedup().deduplicate_with_embeddings(items, &embeddings, DedupeMode::Chains).unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|i| i.story_chain_id.is_none() && i.duplicates.is_empty()));
    }

    #[test]
    fn chain_ids_are_keyed_on_founder_and_unique() {
        let founder = item("https://a", day(1));
        let mut used = HashSet::new();
        let first = unique_chain_id(&founder, &mut used);
        let second = unique_chain_id(&founder, &mut used);
        assert_eq!(first.len(), CHAIN_ID_LEN);
        assert_eq!(first, chain_id(&founder));
        assert_eq!(second, format!("{first}-2"));
    }

    #[test]
    fn rejects_mismatched_embeddings() {
        let items = vec![item("https://a", day(1)), item("https://b", day(1))];
        let err = dedup()
            .deduplicate_with_embeddings(items.clone(), &[vec![1.0]], DedupeMode::Standard)
            .unwrap_err();
        assert!(matches!(err, CurateError::LengthMismatch { vectors: 1, metadata: 2 }));

        let err = dedup()
            .deduplicate_with_embeddings(items, &[vec![1.0], vec![1.0, 0.0]], DedupeMode::Standard)
            .unwrap_err();
        assert!(matches!(err, CurateError::DimensionMismatch { expected: 1, actual: 2 }));
    }

    #[test]
    fn run_mode_selects_dedupe_mode() {
        assert_eq!(DedupeMode::from(RunMode::Daily), DedupeMode::Standard);
        assert_eq!(DedupeMode::from(RunMode::Weekly), DedupeMode::Chains);
    }
}
