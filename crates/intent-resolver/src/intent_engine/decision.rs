// intent-resolver/crates/intent-resolver/src/intent_engine/decision.rs

use serde::{Deserialize, Serialize};

use crate::catalog::SystemInfoKind;
use crate::embeddings::ConfidenceBand;
use crate::memory::{ConversationTurn, Params};

/// Outcome of resolving one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Execute {
        query_id: String,
        params: Params,
        similarity_score: f32,
        confidence: ConfidenceBand,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    NeedMoreInfo {
        clarification_question: String,
    },
    OutOfScope {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        similarity_score: Option<f32>,
    },
    SystemInfo {
        message: String,
        info_type: SystemInfoKind,
    },
    Error {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_payload: Option<serde_json::Value>,
        #[serde(default)]
        top_candidates: Vec<String>,
    },
}

impl Decision {
    pub fn need_more_info(question: impl Into<String>) -> Self {
        Decision::NeedMoreInfo {
            clarification_question: question.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Decision::Error {
            reason: reason.into(),
            raw_payload: None,
            top_candidates: Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Decision::Execute { .. } => "EXECUTE",
            Decision::NeedMoreInfo { .. } => "NEED_MORE_INFO",
            Decision::OutOfScope { .. } => "OUT_OF_SCOPE",
            Decision::SystemInfo { .. } => "SYSTEM_INFO",
            Decision::Error { .. } => "ERROR",
        }
    }

    pub fn is_execute(&self) -> bool {
        matches!(self, Decision::Execute { .. })
    }

    pub fn query_id(&self) -> Option<&str> {
        match self {
            Decision::Execute { query_id, .. } => Some(query_id),
            _ => None,
        }
    }
}

impl ConversationTurn {
    /// Turn to record for an executed decision; other outcomes leave no turn.
    pub fn from_decision(question: &str, decision: &Decision) -> Option<Self> {
        match decision {
            Decision::Execute { query_id, params, .. } => {
                Some(ConversationTurn::new(question).with_query(query_id.clone(), params.clone()))
            }
            _ => None,
        }
    }
}
