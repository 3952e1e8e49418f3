//! In-memory embedding index over catalog entries.

use anyhow::{Context, Result};
use moka::sync::Cache;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::embedder::{cosine_similarity, Embedder};
use crate::catalog::{CatalogEntry, QueryCatalog};
use crate::utils::TextUtils;

pub const HIGH_CONFIDENCE: f32 = 0.80;
pub const MEDIUM_CONFIDENCE: f32 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: f32) -> Self {
        if score >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if score >= MEDIUM_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub description: String,
    pub example_question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub entry_id: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry_id: String,
    pub score: f32,
    pub confidence: ConfidenceBand,
    pub metadata: EntryMetadata,
}

/// The text that represents an entry in vector space.
pub fn embedding_text(entry: &CatalogEntry) -> String {
    let mut parts = vec![entry.description.clone(), format!("Query ID: {}", entry.id)];

    if !entry.parameters.is_empty() {
        let params: Vec<String> = entry
            .parameters
            .iter()
            .map(|(name, spec)| match (&spec.default, spec.required) {
                (_, true) => format!("{} (required): {}", name, spec.description),
                (Some(default), false) => format!("{} (optional, default={}): {}", name, default, spec.description),
                (None, false) => format!("{} (optional): {}", name, spec.description),
            })
            .collect();
        parts.push(format!("Parameters: {}", params.join("; ")));
    }

    if let Some(example) = &entry.example_question {
        parts.push(format!("Example question: {}", example));
    }

    parts.join(". ")
}

pub struct EmbeddingIndex {
    model_id: String,
    records: Vec<EmbeddingRecord>,
    embedder: Arc<dyn Embedder>,
    question_vectors: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingIndex {
    /// Embed every catalog entry (in parallel) and index the vectors.
    pub fn build(catalog: &QueryCatalog, embedder: Arc<dyn Embedder>, cache_capacity: u64) -> Result<Self> {
        let start = std::time::Instant::now();
        let records = catalog
            .entries()
            .par_iter()
            .map(|entry| {
                let vector = embedder
                    .embed(&embedding_text(entry))
                    .with_context(|| format!("Failed to embed catalog entry {}", entry.id))?;
                Ok(EmbeddingRecord {
                    entry_id: entry.id.clone(),
                    vector,
                    metadata: EntryMetadata {
                        description: entry.description.clone(),
                        example_question: entry.example_question.clone(),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Embedded {} catalog entries with {} in {:?}",
            records.len(),
            embedder.model_id(),
            start.elapsed()
        );
        Self::from_records(records, embedder, cache_capacity)
    }

    /// Wrap previously computed records, e.g. from the persisted cache.
    pub fn from_records(records: Vec<EmbeddingRecord>, embedder: Arc<dyn Embedder>, cache_capacity: u64) -> Result<Self> {
        let dimension = embedder.dimension();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            anyhow::bail!(
                "Embedding for {} has {} dimensions, model {} produces {}",
                bad.entry_id,
                bad.vector.len(),
                embedder.model_id(),
                dimension
            );
        }

        Ok(Self {
            model_id: embedder.model_id().to_string(),
            records,
            embedder,
            question_vectors: Cache::new(cache_capacity.max(1)),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn question_vector(&self, question: &str) -> Result<Arc<Vec<f32>>> {
        let key = TextUtils::normalize_whitespace(question).to_lowercase();
        if let Some(vector) = self.question_vectors.get(&key) {
            debug!("Question vector cache hit");
            return Ok(vector);
        }
        let vector = Arc::new(self.embedder.embed(&key).context("Failed to embed question")?);
        self.question_vectors.insert(key, vector.clone());
        Ok(vector)
    }

    /// Entries sorted by descending similarity, cut to `top_k`, then filtered
    /// to those scoring at least `min_similarity`.
    pub fn retrieve(&self, question: &str, top_k: usize, min_similarity: f32) -> Result<Vec<ScoredEntry>> {
        if self.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = self.question_vector(question)?;
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (idx, cosine_similarity(&query, &record.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        let results: Vec<ScoredEntry> = scored
            .into_iter()
            .filter(|(_, score)| *score >= min_similarity)
            .map(|(idx, score)| {
                let record = &self.records[idx];
                ScoredEntry {
                    entry_id: record.entry_id.clone(),
                    score,
                    confidence: ConfidenceBand::from_score(score),
                    metadata: record.metadata.clone(),
                }
            })
            .collect();

        debug!(
            "Retrieved {} candidates (top: {:?})",
            results.len(),
            results.first().map(|r| (&r.entry_id, r.score))
        );
        Ok(results)
    }
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("model_id", &self.model_id)
            .field("records", &self.records.len())
            .finish()
    }
}
