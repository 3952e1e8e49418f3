//! Intent engine - decides which catalog query answers a question and with
//! which parameters.

pub mod candidate_retriever;
pub mod decision;
pub mod decision_normalizer;
pub mod followup_detector;
pub mod keyword_tables;
pub mod meta_detector;
pub mod orchestrator;
pub mod parameter_resolver;
pub mod payload;
pub mod prompts;

pub use candidate_retriever::{retrieve_candidates, Candidate, RetrievalSettings};
pub use decision::Decision;
pub use decision_normalizer::normalize;
pub use followup_detector::{FollowUpSignal, UnsupportedReference};
pub use meta_detector::detect_system_info;
pub use orchestrator::IntentEngine;
pub use parameter_resolver::{normalize_location, MissingParam, ParamResolution, ParameterResolver};
pub use payload::parse_payload;
