//! Vector retrieval over the query catalog

pub mod embedder;
pub mod index;
pub mod index_cache;

pub use embedder::{cosine_similarity, Embedder, HashingEmbedder};
pub use index::{ConfidenceBand, EmbeddingIndex, EmbeddingRecord, EntryMetadata, ScoredEntry};
pub use index_cache::{CacheOutcome, IndexFingerprint, IndexLoader};
