//! Intent engine orchestrator - coordinates meta detection, follow-up detection,
//! retrieval, the external decision and parameter resolution for one question.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::candidate_retriever::{retrieve_candidates, Candidate, RetrievalSettings};
use super::decision::Decision;
use super::decision_normalizer::normalize;
use super::followup_detector::{self, FollowUpSignal};
use super::meta_detector::detect_system_info;
use super::parameter_resolver::ParameterResolver;
use super::payload::parse_payload;
use super::prompts::{render_instruction, render_request};
use crate::catalog::{QueryCatalog, SystemInfo};
use crate::config::Config;
use crate::decision_source::{DecisionSource, HttpDecisionSource};
use crate::embeddings::{Embedder, HashingEmbedder, IndexLoader};
use crate::memory::{ConversationTurn, InMemorySessionStore, SessionContext, SessionStore};
use crate::utils::TextUtils;

const EMPTY_QUESTION: &str = "Please ask a question about the ERCOT forecast data, for example grid stress, load, temperature or renewables.";

pub struct IntentEngine {
    catalog: Arc<QueryCatalog>,
    loader: Arc<IndexLoader>,
    store: Arc<dyn SessionStore>,
    source: Arc<dyn DecisionSource>,
    resolver: ParameterResolver,
    system_info: SystemInfo,
    retrieval: RetrievalSettings,
    fallback_threshold: f32,
    instruction: String,
}

impl IntentEngine {
    pub fn new(
        config: &Config,
        catalog: Arc<QueryCatalog>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn SessionStore>,
        source: Arc<dyn DecisionSource>,
    ) -> Self {
        let loader = Arc::new(IndexLoader::new(
            catalog.clone(),
            embedder,
            config.embedding_cache_path.clone(),
            config.question_cache_capacity,
        ));

        info!(
            "Intent engine ready (catalog {}, {} entries)",
            catalog.version(),
            catalog.len()
        );
        Self {
            catalog,
            loader,
            store,
            source,
            resolver: ParameterResolver::from_config(config),
            system_info: config.system_info(),
            retrieval: RetrievalSettings {
                top_k: config.retrieval_top_k,
                min_similarity: config.min_similarity,
                forced_score: config.follow_up_forced_score,
            },
            fallback_threshold: config.fallback_threshold,
            instruction: render_instruction(&config.default_project),
        }
    }

    /// Builtin catalog, local hashing embedder, in-memory sessions and the HTTP decision source.
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = Arc::new(QueryCatalog::builtin()?);
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(&config.embedding_model, config.embedding_dim));
        let store: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(config.max_history_turns, config.session_ttl()));
        let source: Arc<dyn DecisionSource> = Arc::new(HttpDecisionSource::from_config(config)?);
        Ok(Self::new(config, catalog, embedder, store, source))
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &IndexLoader {
        &self.loader
    }

    pub fn session(&self, session_id: &str) -> SessionContext {
        self.store.get_or_create(session_id)
    }

    pub fn record_turn(&self, session_id: &str, turn: ConversationTurn) {
        self.store.append_turn(session_id, turn);
    }

    pub fn clear_session(&self, session_id: &str) {
        self.store.clear(session_id);
    }

    pub fn evict_idle_sessions(&self) -> usize {
        self.store.evict_idle()
    }

    /// Resolve one question. Every failure is reported as a [`Decision`].
    pub async fn resolve(&self, session_id: &str, question: &str) -> Decision {
        if TextUtils::is_blank(question) {
            return Decision::need_more_info(EMPTY_QUESTION);
        }
        let question = TextUtils::normalize_whitespace(question);
        debug!("Resolving question for session {}: {}", session_id, question);

        if let Some(kind) = detect_system_info(&question) {
            return Decision::SystemInfo {
                message: self.system_info.message(kind),
                info_type: kind,
            };
        }

        let context = self.store.get_or_create(session_id);
        let follow_up = followup_detector::detect(&question, &context, &self.catalog);

        if let Some(signal) = follow_up.as_ref().filter(|s| s.incompatible) {
            return Decision::need_more_info(incompatible_message(signal));
        }

        let candidates = match self.candidates(&question, follow_up.as_ref()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Candidate retrieval failed: {:#}", e);
                return Decision::error(format!("Candidate retrieval failed: {:#}", e));
            }
        };

        if candidates.is_empty() {
            info!("No catalog entry is close to the question");
            let mut message = "I couldn't match that question to any of the forecast queries I support. Try rephrasing it".to_string();
            if context.has_prior_query() {
                message.push_str(", or say \"same ...\" to adjust the previous query");
            }
            message.push('.');
            return Decision::OutOfScope { message, similarity_score: None };
        }

        let request = render_request(&question, &candidates, &self.catalog, &context, follow_up.as_ref());
        let reply = match self.source.decide(&self.instruction, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Decision source failed: {:#}", e);
                return Decision::Error {
                    reason: format!("Decision source failed: {:#}", e),
                    raw_payload: None,
                    top_candidates: candidates.iter().take(3).map(|c| c.entry_id.clone()).collect(),
                };
            }
        };

        let decision = normalize(&parse_payload(&reply), &candidates, self.fallback_threshold);
        self.finalize(decision, &context)
    }

    async fn candidates(&self, question: &str, follow_up: Option<&FollowUpSignal>) -> Result<Vec<Candidate>> {
        let index = if self.loader.is_loaded() {
            self.loader.load()?
        } else {
            // first use builds or reads the index; keep that off the async workers
            let loader = self.loader.clone();
            tokio::task::spawn_blocking(move || loader.load())
                .await
                .context("Embedding index task failed")??
        };
        retrieve_candidates(&index, &self.catalog, question, follow_up, self.retrieval)
    }

    fn finalize(&self, decision: Decision, context: &SessionContext) -> Decision {
        let (query_id, params, similarity_score, confidence, note) = match decision {
            Decision::Execute { query_id, params, similarity_score, confidence, note } => {
                (query_id, params, similarity_score, confidence, note)
            }
            other => return other,
        };

        match self.resolver.resolve(&self.catalog, &query_id, &params, context) {
            Ok(resolution) if !resolution.is_complete() => {
                info!("{} is missing {} required parameters", query_id, resolution.missing.len());
                Decision::need_more_info(resolution.clarification())
            }
            Ok(resolution) => Decision::Execute {
                query_id,
                params: resolution.resolved,
                similarity_score,
                confidence,
                note,
            },
            Err(e) => Decision::error(format!("Parameter resolution failed: {:#}", e)),
        }
    }
}

fn incompatible_message(signal: &FollowUpSignal) -> String {
    let references: Vec<String> = signal
        .unsupported
        .iter()
        .map(|u| format!("'{}' ({})", u.keyword, u.parameter))
        .collect();
    let available = if signal.available_parameters.is_empty() {
        "no parameters".to_string()
    } else {
        signal.available_parameters.join(", ")
    };
    format!(
        "The previous query {} cannot be adjusted by {}. It accepts: {}. Please ask it as a new question if you want different data.",
        signal.last_query_id,
        references.join(", "),
        available
    )
}
