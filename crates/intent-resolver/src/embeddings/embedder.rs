// intent-resolver/crates/intent-resolver/src/embeddings/embedder.rs

use anyhow::Result;
use std::collections::HashMap;

/// Text to vector boundary. Implementations must be deterministic for a given
/// `model_id`, since cached vectors are reused across processes on that basis.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "for", "to", "and", "or", "is", "are", "be", "by", "on", "at",
    "with", "that", "this", "it", "its", "what", "which", "when", "from", "as", "me", "show", "tell",
    "give", "please", "i", "you", "do", "does", "can",
];

const BIGRAM_WEIGHT: f32 = 0.8;

/// Local embedding model: signed feature hashing of unigrams and bigrams into a
/// fixed number of buckets, sublinear term weighting, L2 normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(name: &str, dimension: usize) -> Self {
        Self {
            model_id: format!("{}:{}", name, dimension),
            dimension: dimension.max(1),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '.')
            .map(|t| t.trim_matches('.').to_lowercase())
            .filter(|t| !t.is_empty() && !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    fn features(text: &str) -> HashMap<String, f32> {
        let tokens = Self::tokens(text);
        let mut counts: HashMap<String, f32> = HashMap::new();

        for token in &tokens {
            *counts.entry(token.clone()).or_default() += 1.0;
        }
        for pair in tokens.windows(2) {
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += BIGRAM_WEIGHT;
        }
        counts
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for (feature, count) in Self::features(text) {
            let (bucket, sign) = self.bucket(&feature);
            vector[bucket] += sign * (1.0 + count.ln());
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new("hashing-bigram-v1", 384);
        let a = embedder.embed("Probability of GSI above 0.60 in the next 14 days").unwrap();
        let b = embedder.embed("Probability of GSI above 0.60 in the next 14 days").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_model_id_includes_dimension() {
        assert_eq!(HashingEmbedder::new("m", 64).model_id(), "m:64");
        assert_ne!(
            HashingEmbedder::new("m", 64).model_id(),
            HashingEmbedder::new("m", 128).model_id()
        );
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new("m", 32);
        let v = embedder.embed("the of and").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = HashingEmbedder::new("m", 384);
        let q = embedder.embed("wind generation ramp").unwrap();
        let near = embedder.embed("largest downward wind generation ramp").unwrap();
        let far = embedder.embed("correlation between dew point and load").unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_tokens_split_identifiers_and_keep_decimals() {
        let tokens = HashingEmbedder::tokens("Query ID: GSI_PEAK_PROBABILITY_14_DAYS, default=0.6.");
        assert_eq!(tokens, vec!["query", "id", "gsi", "peak", "probability", "14", "days", "default", "0.6"]);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
