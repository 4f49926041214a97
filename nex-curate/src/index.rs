//! Flat cosine-similarity vector index with on-disk persistence.
//!
//! [`VectorIndex`] stores unit-normalized embeddings next to an
//! [`IndexMetadata`] record and answers exact nearest-neighbor queries. It is
//! append-only: identical vectors are stored twice if added twice, because
//! deciding what counts as a duplicate is the clustering engine's job.
//!
//! Mutation takes `&mut self` and there is no interior locking. Share an index
//! across tasks by wrapping it in a lock owned by the caller.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{CurateError, Result};
use crate::item::NewsItem;
use crate::similarity::{l2_normalize, similarity_from_l2};

const MAGIC: &[u8; 4] = b"NXVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 8;

/// The record stored alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMetadata {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source_name: String,
    /// Caller-defined fields carried through search results untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl From<&NewsItem> for IndexMetadata {
    fn from(item: &NewsItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            source_name: item.source_name.clone(),
            extra: BTreeMap::new(),
        }
    }
}

/// A search result: the stored record and its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexHit {
    pub metadata: IndexMetadata,
    pub similarity: f32,
}

/// An exact nearest-neighbor index over unit vectors.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major, `dimension` floats per entry.
    vectors: Vec<f32>,
    metadata: Vec<IndexMetadata>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` entries.
    pub fn new(dimension: usize) -> Self {
        debug!(dimension, "created vector index");
        Self { dimension, vectors: Vec::new(), metadata: Vec::new() }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total stored vectors.
    pub fn size(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    fn row(&self, index: usize) -> &[f32] {
        &self.vectors[index * self.dimension..(index + 1) * self.dimension]
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(CurateError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append vectors and their metadata.
    ///
    /// Vectors are L2-normalized before storage. Nothing is stored unless
    /// every vector passes validation.
    ///
    /// # Errors
    ///
    /// [`CurateError::LengthMismatch`] if the counts differ,
    /// [`CurateError::DimensionMismatch`] if any vector has the wrong length.
    pub fn add(&mut self, vectors: &[Vec<f32>], metadata: Vec<IndexMetadata>) -> Result<()> {
        if vectors.len() != metadata.len() {
            return Err(CurateError::LengthMismatch {
                vectors: vectors.len(),
                metadata: metadata.len(),
            });
        }
        for vector in vectors {
            self.check_dimension(vector)?;
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.vectors.extend(l2_normalize(vector));
        }
        self.metadata.extend(metadata);

        debug!(added = vectors.len(), total = self.size(), "added vectors to index");
        Ok(())
    }

    /// Return up to `k` hits ordered by decreasing similarity.
    ///
    /// Similarity is `1 - d^2 / 2` for the L2 distance `d` between unit
    /// vectors. Hits below `threshold` are dropped. Equal similarities keep
    /// insertion order.
    ///
    /// # Errors
    ///
    /// [`CurateError::DimensionMismatch`] if the query has the wrong length.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<IndexHit>> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query = l2_normalize(query);
        let mut scored: Vec<(usize, f32)> =
            (0..self.size()).map(|i| (i, similarity_from_l2(self.row(i), &query))).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .filter(|(_, similarity)| threshold.is_none_or(|t| *similarity >= t))
            .take(k)
            .map(|(i, similarity)| IndexHit { metadata: self.metadata[i].clone(), similarity })
            .collect())
    }

    /// Run [`search`](VectorIndex::search) for each query.
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<Vec<IndexHit>>> {
        queries.iter().map(|query| self.search(query, k, threshold)).collect()
    }

    /// Paths of the two companion artifacts for `path`.
    pub fn artifact_paths(path: impl AsRef<Path>) -> (PathBuf, PathBuf) {
        let path = path.as_ref();
        (path.with_extension("index"), path.with_extension("metadata"))
    }

    /// Write `<path>.index` (binary vectors) and `<path>.metadata` (JSON).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let (index_path, metadata_path) = Self::artifact_paths(&path);
        if let Some(parent) = index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut blob = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        blob.extend_from_slice(&(self.dimension as u64).to_le_bytes());
        blob.extend_from_slice(&(self.size() as u64).to_le_bytes());
        for value in &self.vectors {
            blob.extend_from_slice(&value.to_le_bytes());
        }
        fs::write(&index_path, blob)?;
        fs::write(&metadata_path, serde_json::to_vec(&self.metadata)?)?;

        info!(path = %index_path.display(), vectors = self.size(), "saved vector index");
        Ok(())
    }

    /// Replace this index's contents with the artifacts saved at `path`.
    ///
    /// A missing artifact is not an error: the index is left as it was.
    ///
    /// # Errors
    ///
    /// [`CurateError::DimensionMismatch`] if the saved index has a different
    /// dimension, [`CurateError::CorruptIndex`] if the artifacts are malformed
    /// or disagree on the entry count.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (index_path, metadata_path) = Self::artifact_paths(&path);
        if !index_path.exists() || !metadata_path.exists() {
            warn!(path = %path.as_ref().display(), "vector index files not found");
            return Ok(());
        }

        let blob = fs::read(&index_path)?;
        let (dimension, vectors) = decode_vectors(&blob)?;
        if dimension != self.dimension {
            return Err(CurateError::DimensionMismatch {
                expected: self.dimension,
                actual: dimension,
            });
        }

        let metadata: Vec<IndexMetadata> = serde_json::from_slice(&fs::read(&metadata_path)?)
            .map_err(|e| CurateError::CorruptIndex(format!("unreadable metadata: {e}")))?;
        let count = if dimension == 0 { 0 } else { vectors.len() / dimension };
        if count != metadata.len() {
            return Err(CurateError::CorruptIndex(format!(
                "{count} vectors but {} metadata records",
                metadata.len()
            )));
        }

        self.vectors = vectors;
        self.metadata = metadata;
        info!(path = %index_path.display(), vectors = self.size(), "loaded vector index");
        Ok(())
    }
}

fn decode_vectors(blob: &[u8]) -> Result<(usize, Vec<f32>)> {
    if blob.len() < HEADER_LEN || &blob[..4] != MAGIC {
        return Err(CurateError::CorruptIndex("missing index header".to_string()));
    }
    let read_u64 = |at: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&blob[at..at + 8]);
        u64::from_le_bytes(bytes)
    };

    let mut version = [0u8; 4];
    version.copy_from_slice(&blob[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(CurateError::CorruptIndex(format!("unsupported format version {version}")));
    }

    let dimension = usize::try_from(read_u64(8))
        .map_err(|_| CurateError::CorruptIndex("dimension overflows usize".to_string()))?;
    let count = usize::try_from(read_u64(16))
        .map_err(|_| CurateError::CorruptIndex("count overflows usize".to_string()))?;
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CurateError::CorruptIndex("index size overflows".to_string()))?;

    let body = &blob[HEADER_LEN..];
    if body.len() != expected {
        return Err(CurateError::CorruptIndex(format!(
            "expected {expected} bytes of vectors, found {}",
            body.len()
        )));
    }

    let vectors = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dimension, vectors))
}

/// Embed each item's title and snippet and index it under its metadata.
///
/// # Errors
///
/// Propagates [`CurateError::EmbeddingProviderFailure`] and index contract errors.
pub async fn build_index(
    items: &[NewsItem],
    provider: &dyn EmbeddingProvider,
) -> Result<VectorIndex> {
    info!(items = items.len(), "building vector index");
    let mut index = VectorIndex::new(provider.dimensions());
    if items.is_empty() {
        return Ok(index);
    }

    let texts: Vec<String> = items.iter().map(NewsItem::embedding_text).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let embeddings = provider.embed_batch(&refs).await?;
    index.add(&embeddings, items.iter().map(IndexMetadata::from).collect())?;

    info!(vectors = index.size(), "built vector index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> IndexMetadata {
        IndexMetadata {
            id: id.to_string(),
            title: format!("title {id}"),
            url: format!("https://example.com/{id}"),
            source_name: "Test".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn add_rejects_wrong_dimension_without_partial_insert() {
        let mut index = VectorIndex::new(3);
        let err = index
            .add(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]], vec![meta("a"), meta("b")])
            .unwrap_err();
        assert!(matches!(err, CurateError::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn add_rejects_count_mismatch() {
        let mut index = VectorIndex::new(2);
        let err = index.add(&[vec![1.0, 0.0]], vec![]).unwrap_err();
        assert!(matches!(err, CurateError::LengthMismatch { vectors: 1, metadata: 0 }));
    }

    #[test]
    fn search_orders_by_similarity_and_applies_threshold() {
        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
                vec![meta("up"), meta("right"), meta("diag")],
            )
            .unwrap();

        let hits = index.search(&[2.0, 0.0], 3, None).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.metadata.id.as_str()).collect();
        assert_eq!(ids, ["right", "diag", "up"]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);

        let hits = index.search(&[2.0, 0.0], 3, Some(0.5)).unwrap();
        assert_eq!(hits.len(), 2);

        assert!(index.search(&[1.0, 0.0], 0, None).unwrap().is_empty());
        assert!(matches!(
            index.search(&[1.0], 1, None),
            Err(CurateError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn identical_vectors_are_not_deduplicated() {
        let mut index = VectorIndex::new(2);
        index.add(&[vec![1.0, 0.0], vec![1.0, 0.0]], vec![meta("a"), meta("b")]).unwrap();
        assert_eq!(index.size(), 2);
        let hits = index.search(&[1.0, 0.0], 5, None).unwrap();
        assert_eq!(hits[0].metadata.id, "a");
        assert_eq!(hits[1].metadata.id, "b");
    }

    #[test]
    fn load_from_missing_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new(4);
        index.load(dir.path().join("nothing")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn load_rejects_other_dimension_and_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        let mut index = VectorIndex::new(2);
        index.add(&[vec![1.0, 0.0]], vec![meta("a")]).unwrap();
        index.save(&path).unwrap();

        let mut other = VectorIndex::new(3);
        assert!(matches!(other.load(&path), Err(CurateError::DimensionMismatch { .. })));

        let (index_path, _) = VectorIndex::artifact_paths(&path);
        let mut blob = fs::read(&index_path).unwrap();
        blob.truncate(blob.len() - 2);
        fs::write(&index_path, blob).unwrap();
        let mut fresh = VectorIndex::new(2);
        assert!(matches!(fresh.load(&path), Err(CurateError::CorruptIndex(_))));
    }
}
