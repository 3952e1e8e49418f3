// intent-resolver/crates/intent-resolver/src/intent_engine/prompts.rs

use serde_json::{json, Value};
use std::fmt::Write;

use super::candidate_retriever::Candidate;
use super::followup_detector::FollowUpSignal;
use super::parameter_resolver::NEED_MORE_INFO_MARKER;
use crate::catalog::QueryCatalog;
use crate::memory::SessionContext;

const HISTORY_TURNS_IN_PROMPT: usize = 5;

pub fn render_instruction(project: &str) -> String {
    format!(
        "You are a backend intent resolver for an energy forecast data API.\n\
         \n\
         Rules:\n\
         - Choose exactly one query_id from AVAILABLE_QUERIES, or answer OUT_OF_SCOPE\n\
         - Never write SQL and never invent a query_id\n\
         - Ask for missing required parameters with NEED_MORE_INFO\n\
         - Use \"{marker}\" as a parameter value you cannot determine\n\
         - The project is always '{project}'\n\
         - For follow-ups (\"same for Houston\", \"now with 7 days\") keep the previous query and change only what the user changed\n\
         - Respond with JSON only, one of:\n\
         {{\"decision\": \"EXECUTE\", \"query_id\": \"...\", \"params\": {{...}}}}\n\
         {{\"decision\": \"NEED_MORE_INFO\", \"clarification_question\": \"...\"}}\n\
         {{\"decision\": \"OUT_OF_SCOPE\", \"message\": \"...\"}}",
        marker = NEED_MORE_INFO_MARKER,
        project = project,
    )
}

fn candidate_json(candidate: &Candidate, catalog: &QueryCatalog) -> Value {
    let parameters: serde_json::Map<String, Value> = catalog
        .get(&candidate.entry_id)
        .map(|entry| {
            entry
                .parameters
                .iter()
                .map(|(name, spec)| {
                    let mut param = json!({
                        "type": spec.param_type.as_str(),
                        "required": spec.required,
                        "description": spec.description,
                    });
                    if let Some(default) = &spec.default {
                        param["default"] = default.clone();
                    }
                    (name.clone(), param)
                })
                .collect()
        })
        .unwrap_or_default();

    let mut value = json!({
        "query_id": candidate.entry_id,
        "description": candidate.metadata.description,
        "similarity": (f64::from(candidate.score) * 1000.0).round() / 1000.0,
        "parameters": parameters,
    });
    if let Some(example) = &candidate.metadata.example_question {
        value["example_question"] = Value::String(example.clone());
    }
    value
}

/// The per-question request: the question, only the retrieved candidates, and
/// enough conversation state to resolve follow-ups.
pub fn render_request(
    question: &str,
    candidates: &[Candidate],
    catalog: &QueryCatalog,
    context: &SessionContext,
    follow_up: Option<&FollowUpSignal>,
) -> String {
    let listed: Vec<Value> = candidates.iter().map(|c| candidate_json(c, catalog)).collect();
    let mut msg = String::new();

    let _ = writeln!(msg, "USER_QUESTION:\n{}\n", question.trim());
    let _ = writeln!(
        msg,
        "AVAILABLE_QUERIES:\n{}\n",
        serde_json::to_string_pretty(&listed).unwrap_or_else(|_| "[]".to_string())
    );

    msg.push_str("CONVERSATION_CONTEXT:\n");
    if context.history.is_empty() {
        msg.push_str("None\n");
    } else {
        for turn in context.recent_turns(HISTORY_TURNS_IN_PROMPT) {
            match &turn.query_id {
                Some(query_id) => {
                    let _ = writeln!(
                        msg,
                        "- Q: {} -> {} {}",
                        turn.question,
                        query_id,
                        Value::Object(turn.params.clone())
                    );
                }
                None => {
                    let _ = writeln!(msg, "- Q: {}", turn.question);
                }
            }
        }
        if let Some(last) = &context.last_query_id {
            let _ = writeln!(msg, "LAST_QUERY_ID: {}", last);
            let _ = writeln!(msg, "LAST_PARAMS: {}", Value::Object(context.last_params.clone()));
        }
    }

    if let Some(signal) = follow_up.filter(|s| s.is_follow_up) {
        let _ = writeln!(
            msg,
            "\nThis looks like a follow-up to {}; reuse it unless the user clearly asks for something else.",
            signal.last_query_id
        );
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{ConfidenceBand, EntryMetadata};
    use crate::memory::{ConversationTurn, Params};
    use std::collections::BTreeSet;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            entry_id: id.to_string(),
            score: 0.81234,
            confidence: ConfidenceBand::High,
            metadata: EntryMetadata {
                description: "Peak GSI probability".to_string(),
                example_question: Some("Peak GSI over 0.6?".to_string()),
            },
            forced: false,
        }
    }

    #[test]
    fn test_instruction_names_project_and_outcomes() {
        let text = render_instruction("ercot_generic");
        assert!(text.contains("'ercot_generic'"));
        assert!(text.contains("\"decision\": \"EXECUTE\""));
        assert!(text.contains("OUT_OF_SCOPE"));
        assert!(text.contains(NEED_MORE_INFO_MARKER));
    }

    #[test]
    fn test_request_lists_only_given_candidates_with_schema() {
        let catalog = QueryCatalog::builtin().unwrap();
        let text = render_request(
            "peak gsi?",
            &[candidate("GSI_PEAK_PROBABILITY_14_DAYS")],
            &catalog,
            &SessionContext::default(),
            None,
        );
        assert!(text.contains("GSI_PEAK_PROBABILITY_14_DAYS"));
        assert!(text.contains("gsi_threshold"));
        assert!(text.contains("0.812"));
        assert!(!text.contains("TIGHTEST_HOUR_GSI"));
        assert!(text.contains("CONVERSATION_CONTEXT:\nNone"));
    }

    #[test]
    fn test_request_includes_recent_history_and_follow_up_hint() {
        let catalog = QueryCatalog::builtin().unwrap();
        let mut context = SessionContext::default();
        for i in 0..8 {
            context.add_turn(ConversationTurn::new(format!("question {}", i)).with_query("TIGHTEST_HOUR_GSI", Params::new()));
        }
        let signal = FollowUpSignal {
            is_follow_up: true,
            last_query_id: "TIGHTEST_HOUR_GSI".to_string(),
            matched_concepts: BTreeSet::new(),
            incompatible: false,
            unsupported: Vec::new(),
            available_parameters: Vec::new(),
            reason: String::new(),
        };

        let text = render_request("again", &[], &catalog, &context, Some(&signal));
        assert!(!text.contains("question 2"));
        assert!(text.contains("question 3"));
        assert!(text.contains("question 7"));
        assert!(text.contains("LAST_QUERY_ID: TIGHTEST_HOUR_GSI"));
        assert!(text.contains("follow-up to TIGHTEST_HOUR_GSI"));
    }
}
