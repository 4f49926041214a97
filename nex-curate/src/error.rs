//! Error types for the `nex-curate` crate.

use thiserror::Error;

/// Errors that can occur while indexing, clustering, or configuring a curation run.
#[derive(Debug, Error)]
pub enum CurateError {
    /// A vector's length does not match the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the index was created with.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// The number of vectors and metadata records passed to the index differ.
    #[error("Length mismatch: {vectors} vectors but {metadata} metadata records")]
    LengthMismatch {
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of metadata records supplied.
        metadata: usize,
    },

    /// The embedding provider failed or returned an unusable batch.
    #[error("Embedding provider failure ({provider}): {message}")]
    EmbeddingProviderFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration value is out of range or inconsistent.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A persisted index could not be decoded.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Reading or writing persisted state failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CurateError {
    /// Shorthand for a [`CurateError::EmbeddingProviderFailure`].
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingProviderFailure { provider: provider.into(), message: message.into() }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Provider and I/O failures are transient; contract violations and bad
    /// configuration are caller bugs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingProviderFailure { .. } | Self::Io(_))
    }
}

/// A convenience result type for curation operations.
pub type Result<T> = std::result::Result<T, CurateError>;
