// intent-resolver/crates/intent-resolver/src/lib.rs

pub mod catalog;
pub mod config;
pub mod decision_source;
pub mod embeddings;
pub mod intent_engine;
pub mod memory;
pub mod telemetry;
pub mod utils;

// Public API exports
pub use catalog::{CatalogEntry, QueryCatalog, SystemInfoKind};
pub use config::Config;
pub use decision_source::{DecisionSource, HttpDecisionSource};
pub use embeddings::{CacheOutcome, Embedder, EmbeddingIndex, HashingEmbedder, IndexLoader};
pub use intent_engine::{Decision, IntentEngine};
pub use memory::{ConversationTurn, InMemorySessionStore, SessionContext, SessionStore};
