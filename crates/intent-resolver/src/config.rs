// intent-resolver/crates/intent-resolver/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::initialization::{DEFAULT_FORECAST_INIT, DEFAULT_SEASONAL_INIT};
use crate::catalog::{InitializationTable, SystemInfo};

#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub embedding_cache_path: Option<PathBuf>,
    pub question_cache_capacity: u64,
    pub retrieval_top_k: usize,
    pub min_similarity: f32,
    pub fallback_threshold: f32,
    pub follow_up_forced_score: f32,
    pub max_history_turns: usize,
    pub session_ttl_seconds: Option<u64>,
    pub default_project: String,
    pub default_location: String,
    pub forecast_init: String,
    pub seasonal_init: String,
    pub decision_backend_url: String,
    pub decision_model: String,
    pub decision_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_model: "hashing-bigram-v1".to_string(),
            embedding_dim: 384,
            embedding_cache_path: Some(PathBuf::from(".embeddings_cache.bin")),
            question_cache_capacity: 1024,
            retrieval_top_k: 5,
            min_similarity: 0.05,
            fallback_threshold: 0.75,
            follow_up_forced_score: 0.95,
            max_history_turns: 25,
            session_ttl_seconds: None,
            default_project: "ercot_generic".to_string(),
            default_location: "rto".to_string(),
            forecast_init: DEFAULT_FORECAST_INIT.to_string(),
            seasonal_init: DEFAULT_SEASONAL_INIT.to_string(),
            decision_backend_url: "http://127.0.0.1:8081".to_string(),
            decision_model: "local-llm".to_string(),
            decision_timeout_seconds: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let defaults = Self::default();

        let embedding_cache_path = match env::var("EMBEDDING_CACHE_PATH") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => defaults.embedding_cache_path.clone(),
        };

        let session_ttl_seconds = match env::var("SESSION_TTL_SECONDS") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("SESSION_TTL_SECONDS is not a number: {}", raw))?,
            ),
            _ => None,
        };

        let config = Self {
            embedding_model: env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dim: parse_var("EMBEDDING_DIM", defaults.embedding_dim)?,
            embedding_cache_path,
            question_cache_capacity: parse_var("QUESTION_CACHE_CAPACITY", defaults.question_cache_capacity)?,
            retrieval_top_k: parse_var("RETRIEVAL_TOP_K", defaults.retrieval_top_k)?,
            min_similarity: parse_var("MIN_SIMILARITY", defaults.min_similarity)?,
            fallback_threshold: parse_var("FALLBACK_THRESHOLD", defaults.fallback_threshold)?,
            follow_up_forced_score: parse_var("FOLLOW_UP_FORCED_SCORE", defaults.follow_up_forced_score)?,
            max_history_turns: parse_var("MAX_HISTORY_TURNS", defaults.max_history_turns)?,
            session_ttl_seconds,
            default_project: env::var("DEFAULT_PROJECT").unwrap_or(defaults.default_project),
            default_location: env::var("DEFAULT_LOCATION").unwrap_or(defaults.default_location),
            forecast_init: env::var("FORECAST_INIT").unwrap_or(defaults.forecast_init),
            seasonal_init: env::var("SEASONAL_INIT").unwrap_or(defaults.seasonal_init),
            decision_backend_url: env::var("DECISION_BACKEND_URL").unwrap_or(defaults.decision_backend_url),
            decision_model: env::var("DECISION_MODEL").unwrap_or(defaults.decision_model),
            decision_timeout_seconds: parse_var("DECISION_TIMEOUT_SECONDS", defaults.decision_timeout_seconds)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            anyhow::bail!("EMBEDDING_DIM must be greater than zero");
        }
        if self.retrieval_top_k == 0 {
            anyhow::bail!("RETRIEVAL_TOP_K must be greater than zero");
        }
        if self.max_history_turns == 0 {
            anyhow::bail!("MAX_HISTORY_TURNS must be greater than zero");
        }
        for (name, value) in [
            ("MIN_SIMILARITY", self.min_similarity),
            ("FALLBACK_THRESHOLD", self.fallback_threshold),
            ("FOLLOW_UP_FORCED_SCORE", self.follow_up_forced_score),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [-1, 1], got {}", name, value);
            }
        }
        Ok(())
    }

    pub fn initialization_table(&self) -> InitializationTable {
        InitializationTable::new(self.forecast_init.clone(), self.seasonal_init.clone())
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo::new(&self.default_project, &self.forecast_init, &self.seasonal_init)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_seconds.map(Duration::from_secs)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_seconds)
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Embedding Model: {} ({} dims)", self.embedding_model, self.embedding_dim);
        match &self.embedding_cache_path {
            Some(path) => info!("- Embedding Cache: {}", path.display()),
            None => info!("- Embedding Cache: disabled"),
        }
        info!("- Retrieval: top {} (min similarity {:.2})", self.retrieval_top_k, self.min_similarity);
        info!("- Fallback Threshold: {:.2}", self.fallback_threshold);
        info!("- Follow-up Forced Score: {:.2}", self.follow_up_forced_score);
        info!("- History Turns: {}", self.max_history_turns);
        match self.session_ttl_seconds {
            Some(ttl) => info!("- Session TTL: {}s", ttl),
            None => info!("- Session TTL: none"),
        }
        info!("- Project: {} (default location {})", self.default_project, self.default_location);
        info!("- Initialization: forecast {}, seasonal {}", self.forecast_init, self.seasonal_init);
        info!("- Decision Backend: {} ({})", self.decision_backend_url, self.decision_model);
        info!("- Decision Timeout: {}s", self.decision_timeout_seconds);
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
