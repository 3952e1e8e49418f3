// intent-resolver/crates/intent-resolver/src/intent_engine/candidate_retriever.rs

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use super::followup_detector::FollowUpSignal;
use crate::catalog::QueryCatalog;
use crate::embeddings::{ConfidenceBand, EmbeddingIndex, EntryMetadata, ScoredEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub entry_id: String,
    pub score: f32,
    pub confidence: ConfidenceBand,
    pub metadata: EntryMetadata,
    /// Injected because the question follows up on it, not because it scored
    pub forced: bool,
}

impl From<ScoredEntry> for Candidate {
    fn from(scored: ScoredEntry) -> Self {
        Self {
            entry_id: scored.entry_id,
            score: scored.score,
            confidence: scored.confidence,
            metadata: scored.metadata,
            forced: false,
        }
    }
}

impl Candidate {
    fn forced(entry_id: &str, score: f32, metadata: EntryMetadata) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            score,
            confidence: ConfidenceBand::from_score(score),
            metadata,
            forced: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub min_similarity: f32,
    pub forced_score: f32,
}

/// Top-K candidates for a question; a follow-up's previous query is always among them.
pub fn retrieve_candidates(
    index: &EmbeddingIndex,
    catalog: &QueryCatalog,
    question: &str,
    follow_up: Option<&FollowUpSignal>,
    settings: RetrievalSettings,
) -> Result<Vec<Candidate>> {
    let mut candidates: Vec<Candidate> = index
        .retrieve(question, settings.top_k, settings.min_similarity)?
        .into_iter()
        .map(Candidate::from)
        .collect();

    if let Some(signal) = follow_up.filter(|s| s.is_follow_up) {
        let already_listed = candidates.iter().any(|c| c.entry_id == signal.last_query_id);
        match catalog.get(&signal.last_query_id) {
            Some(entry) if !already_listed => {
                info!(
                    "Forcing follow-up candidate {} at score {:.2}",
                    entry.id, settings.forced_score
                );
                let metadata = EntryMetadata {
                    description: entry.description.clone(),
                    example_question: entry.example_question.clone(),
                };
                candidates.insert(0, Candidate::forced(&entry.id, settings.forced_score, metadata));
            }
            Some(_) => debug!("Follow-up candidate {} already retrieved", signal.last_query_id),
            None => debug!("Follow-up query {} is not in the catalog", signal.last_query_id),
        }
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const SETTINGS: RetrievalSettings = RetrievalSettings { top_k: 5, min_similarity: 0.05, forced_score: 0.95 };

    fn setup() -> (QueryCatalog, EmbeddingIndex) {
        let catalog = QueryCatalog::builtin().unwrap();
        let index = EmbeddingIndex::build(&catalog, Arc::new(HashingEmbedder::new("test", 384)), 16).unwrap();
        (catalog, index)
    }

    fn follow_up(last_query_id: &str) -> FollowUpSignal {
        FollowUpSignal {
            is_follow_up: true,
            last_query_id: last_query_id.to_string(),
            matched_concepts: BTreeSet::new(),
            incompatible: false,
            unsupported: Vec::new(),
            available_parameters: Vec::new(),
            reason: String::new(),
        }
    }

    #[test]
    fn test_plain_retrieval() {
        let (catalog, index) = setup();
        let candidates = retrieve_candidates(&index, &catalog, "probability of dunkelflaute", None, SETTINGS).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 5);
        assert!(candidates.iter().all(|c| !c.forced));
    }

    #[test]
    fn test_follow_up_forces_missing_candidate_first() {
        let (catalog, index) = setup();
        let signal = follow_up("GSI_PEAK_PROBABILITY_14_DAYS");
        let settings = RetrievalSettings { top_k: 1, ..SETTINGS };
        let candidates =
            retrieve_candidates(&index, &catalog, "probability of dunkelflaute", Some(&signal), settings).unwrap();

        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].forced);
        assert_eq!(candidates[0].entry_id, "GSI_PEAK_PROBABILITY_14_DAYS");
        assert_eq!(candidates[0].score, 0.95);
        assert_eq!(candidates[0].confidence, ConfidenceBand::High);
        assert_eq!(candidates[1].entry_id, "PROBABILITY_DUNKELFLAUTE");
    }

    #[test]
    fn test_forced_candidate_is_sole_candidate_when_nothing_scores() {
        let (catalog, index) = setup();
        let signal = follow_up("TIGHTEST_HOUR_GSI");
        let settings = RetrievalSettings { min_similarity: 1.1, ..SETTINGS };
        let candidates = retrieve_candidates(&index, &catalog, "again", Some(&signal), settings).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].forced);
        assert_eq!(candidates[0].entry_id, "TIGHTEST_HOUR_GSI");
    }

    #[test]
    fn test_listed_candidate_is_not_duplicated() {
        let (catalog, index) = setup();
        let signal = follow_up("PROBABILITY_DUNKELFLAUTE");
        let candidates =
            retrieve_candidates(&index, &catalog, "probability of dunkelflaute", Some(&signal), SETTINGS).unwrap();
        assert_eq!(candidates.iter().filter(|c| c.entry_id == "PROBABILITY_DUNKELFLAUTE").count(), 1);
        assert!(!candidates[0].forced);
    }

    #[test]
    fn test_unknown_follow_up_query_is_ignored() {
        let (catalog, index) = setup();
        let signal = follow_up("RETIRED_QUERY");
        let settings = RetrievalSettings { min_similarity: 1.1, ..SETTINGS };
        let candidates = retrieve_candidates(&index, &catalog, "again", Some(&signal), settings).unwrap();
        assert!(candidates.is_empty());
    }
}
