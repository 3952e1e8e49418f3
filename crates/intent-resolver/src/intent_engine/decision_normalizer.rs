//! Turns an untrusted decision payload into a canonical [`Decision`].
//!
//! Stages run in order: canonical `decision` field, nested discriminator,
//! candidate validation, similarity fallback, error.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::candidate_retriever::Candidate;
use super::decision::Decision;
use crate::memory::Params;

const DEFAULT_CLARIFICATION: &str = "Could you give a few more details about what you want to know?";
const DEFAULT_OUT_OF_SCOPE: &str = "That question is outside the forecast data I can query.";
const MAX_REPORTED_CANDIDATES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
enum Lifted {
    Execute { query_id: Option<String>, params: Params },
    NeedMoreInfo { clarification_question: String },
    OutOfScope { message: String },
    /// A `decision` label outside the three outcomes
    Unrecognized { label: String },
}

fn normalize_label(label: &str) -> String {
    label.trim().to_uppercase().replace(|c: char| c == '-' || c == ' ', "_")
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn lift_fields(label: &str, object: &Map<String, Value>) -> Option<Lifted> {
    match normalize_label(label).as_str() {
        "EXECUTE" => Some(Lifted::Execute {
            query_id: string_field(object, &["query_id"]),
            params: object
                .get("params")
                .or_else(|| object.get("parameters"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }),
        "NEED_MORE_INFO" => Some(Lifted::NeedMoreInfo {
            clarification_question: string_field(object, &["clarification_question", "question", "message"])
                .unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string()),
        }),
        "OUT_OF_SCOPE" => Some(Lifted::OutOfScope {
            message: string_field(object, &["message", "reason"]).unwrap_or_else(|| DEFAULT_OUT_OF_SCOPE.to_string()),
        }),
        _ => None,
    }
}

/// `{"OUT_OF_SCOPE": "reason"}`: the scalar is the outcome's text.
fn lift_scalar(label: &str, value: &Value) -> Option<Lifted> {
    let text = value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    match normalize_label(label).as_str() {
        "EXECUTE" => Some(Lifted::Execute { query_id: text, params: Params::new() }),
        "NEED_MORE_INFO" => Some(Lifted::NeedMoreInfo {
            clarification_question: text.unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string()),
        }),
        "OUT_OF_SCOPE" => Some(Lifted::OutOfScope {
            message: text.unwrap_or_else(|| DEFAULT_OUT_OF_SCOPE.to_string()),
        }),
        _ => None,
    }
}

/// Top-level `decision` string with sibling fields.
fn lift_canonical(object: &Map<String, Value>) -> Option<Lifted> {
    let label = object.get("decision")?.as_str()?;
    Some(lift_fields(label, object).unwrap_or_else(|| Lifted::Unrecognized { label: label.to_string() }))
}

/// `{"EXECUTE": {...}}`, `{"OUT_OF_SCOPE": "..."}`, or either shape under a `decision` key.
fn lift_nested(object: &Map<String, Value>) -> Option<Lifted> {
    for (key, value) in object {
        let lifted = match value.as_object() {
            Some(inner) => lift_fields(key, inner),
            None => lift_scalar(key, value),
        };
        if lifted.is_some() {
            return lifted;
        }
    }
    match object.get("decision").and_then(Value::as_object) {
        Some(inner) => lift_canonical(inner).or_else(|| lift_nested(inner)),
        None => None,
    }
}

fn lift(raw: &Value) -> Option<Lifted> {
    let object = raw.as_object()?;
    lift_canonical(object).or_else(|| lift_nested(object))
}

fn top_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
}

fn top_candidate_ids(candidates: &[Candidate]) -> Vec<String> {
    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    sorted
        .into_iter()
        .take(MAX_REPORTED_CANDIDATES)
        .map(|c| c.entry_id.clone())
        .collect()
}

fn contract_error(reason: String, raw: &Value, candidates: &[Candidate]) -> Decision {
    warn!("{}", reason);
    Decision::Error {
        reason,
        raw_payload: Some(raw.clone()),
        top_candidates: top_candidate_ids(candidates),
    }
}

pub fn normalize(raw: &Value, candidates: &[Candidate], fallback_threshold: f32) -> Decision {
    match lift(raw) {
        Some(Lifted::Execute { query_id: None, .. }) => {
            contract_error("Execute decision did not name a query_id".to_string(), raw, candidates)
        }
        Some(Lifted::Execute { query_id: Some(query_id), params }) => {
            match candidates.iter().find(|c| c.entry_id == query_id) {
                Some(candidate) => {
                    debug!(
                        "Decision source chose {} ({:.3}, {} confidence)",
                        query_id,
                        candidate.score,
                        candidate.confidence.as_str()
                    );
                    Decision::Execute {
                        query_id,
                        params,
                        similarity_score: candidate.score,
                        confidence: candidate.confidence,
                        note: None,
                    }
                }
                None => contract_error(
                    format!("Decision source chose {} which was not among the offered candidates", query_id),
                    raw,
                    candidates,
                ),
            }
        }
        Some(Lifted::NeedMoreInfo { clarification_question }) => Decision::NeedMoreInfo { clarification_question },
        Some(Lifted::OutOfScope { message }) => Decision::OutOfScope {
            message,
            similarity_score: top_candidate(candidates).map(|c| c.score),
        },
        Some(Lifted::Unrecognized { label }) => {
            contract_error(format!("Decision source answered with unknown decision {}", label), raw, candidates)
        }
        None => match top_candidate(candidates) {
            Some(top) if top.score >= fallback_threshold => {
                info!(
                    "Unrecognized decision payload, falling back to {} ({:.3})",
                    top.entry_id, top.score
                );
                Decision::Execute {
                    query_id: top.entry_id.clone(),
                    params: Params::new(),
                    similarity_score: top.score,
                    confidence: top.confidence,
                    note: Some(format!(
                        "The decision service reply was not understood; using the closest match {} (similarity {:.2}).",
                        top.entry_id, top.score
                    )),
                }
            }
            _ => contract_error("Unrecognized decision payload".to_string(), raw, candidates),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{ConfidenceBand, EntryMetadata};
    use serde_json::json;

    fn candidate(id: &str, score: f32) -> Candidate {
        Candidate {
            entry_id: id.to_string(),
            score,
            confidence: ConfidenceBand::from_score(score),
            metadata: EntryMetadata {
                description: format!("{} description", id),
                example_question: None,
            },
            forced: false,
        }
    }

    fn candidates(top: f32) -> Vec<Candidate> {
        vec![
            candidate("GSI_PEAK_PROBABILITY_14_DAYS", top),
            candidate("TIGHTEST_HOUR_GSI", top - 0.1),
            candidate("GSI_PATHS_ABOVE_THRESHOLD", top - 0.2),
            candidate("HOURS_HIGH_GSI_PROBABILITY", top - 0.3),
        ]
    }

    #[test]
    fn test_canonical_execute() {
        let raw = json!({ "decision": "execute", "query_id": "TIGHTEST_HOUR_GSI", "params": { "a": 1 } });
        match normalize(&raw, &candidates(0.7), 0.75) {
            Decision::Execute { query_id, params, similarity_score, confidence, note } => {
                assert_eq!(query_id, "TIGHTEST_HOUR_GSI");
                assert_eq!(params["a"], json!(1));
                assert!((similarity_score - 0.6).abs() < 1e-6);
                assert_eq!(confidence, ConfidenceBand::Low);
                assert!(note.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_label_tolerates_case_dashes_and_spaces() {
        let raw = json!({ "decision": "need-more info", "clarification_question": "Which month?" });
        assert_eq!(normalize(&raw, &candidates(0.7), 0.75), Decision::need_more_info("Which month?"));
    }

    #[test]
    fn test_nested_discriminator() {
        let raw = json!({ "EXECUTE": { "query_id": "GSI_PEAK_PROBABILITY_14_DAYS", "params": {} } });
        assert_eq!(
            normalize(&raw, &candidates(0.9), 0.75).query_id(),
            Some("GSI_PEAK_PROBABILITY_14_DAYS")
        );

        let raw = json!({ "decision": { "OUT_OF_SCOPE": { "message": "Not energy related" } } });
        match normalize(&raw, &candidates(0.3), 0.75) {
            Decision::OutOfScope { message, similarity_score } => {
                assert_eq!(message, "Not energy related");
                assert_eq!(similarity_score, Some(0.3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_need_more_info_defaults_question() {
        let raw = json!({ "decision": "NEED_MORE_INFO" });
        assert_eq!(normalize(&raw, &[], 0.75), Decision::need_more_info(DEFAULT_CLARIFICATION));
    }

    #[test]
    fn test_out_of_candidate_id_is_error() {
        let raw = json!({ "decision": "EXECUTE", "query_id": "DROP_TABLES" });
        match normalize(&raw, &candidates(0.9), 0.75) {
            Decision::Error { reason, raw_payload, top_candidates } => {
                assert!(reason.contains("DROP_TABLES"));
                assert_eq!(raw_payload, Some(raw.clone()));
                assert_eq!(top_candidates.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_execute_without_query_id_is_error() {
        let raw = json!({ "decision": "EXECUTE", "params": {} });
        assert_eq!(normalize(&raw, &candidates(0.9), 0.75).kind(), "ERROR");
    }

    #[test]
    fn test_unparseable_payload_with_strong_top_candidate_falls_back() {
        let raw = json!("no idea, sorry");
        match normalize(&raw, &candidates(0.90), 0.75) {
            Decision::Execute { query_id, params, similarity_score, confidence, note } => {
                assert_eq!(query_id, "GSI_PEAK_PROBABILITY_14_DAYS");
                assert!(params.is_empty());
                assert_eq!(similarity_score, 0.90);
                assert_eq!(confidence, ConfidenceBand::High);
                assert!(note.unwrap().contains("GSI_PEAK_PROBABILITY_14_DAYS"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_payload_with_weak_top_candidate_is_error() {
        let raw = json!({ "answer": 42 });
        match normalize(&raw, &candidates(0.40), 0.75) {
            Decision::Error { raw_payload, top_candidates, .. } => {
                assert_eq!(raw_payload, Some(raw.clone()));
                assert_eq!(
                    top_candidates,
                    vec!["GSI_PEAK_PROBABILITY_14_DAYS", "TIGHTEST_HOUR_GSI", "GSI_PATHS_ABOVE_THRESHOLD"]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scalar_discriminators_are_honored_over_fallback() {
        let raw = json!({ "OUT_OF_SCOPE": "Only forecast questions are supported" });
        match normalize(&raw, &candidates(0.9), 0.75) {
            Decision::OutOfScope { message, .. } => assert_eq!(message, "Only forecast questions are supported"),
            other => panic!("unexpected {:?}", other),
        }

        let raw = json!({ "NEED_MORE_INFO": "Which zone?" });
        assert_eq!(normalize(&raw, &candidates(0.9), 0.75), Decision::need_more_info("Which zone?"));

        let raw = json!({ "decision": { "OUT_OF_SCOPE": null } });
        match normalize(&raw, &candidates(0.9), 0.75) {
            Decision::OutOfScope { message, .. } => assert_eq!(message, DEFAULT_OUT_OF_SCOPE),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scalar_execute_names_query() {
        let raw = json!({ "EXECUTE": "TIGHTEST_HOUR_GSI" });
        assert_eq!(normalize(&raw, &candidates(0.9), 0.75).query_id(), Some("TIGHTEST_HOUR_GSI"));
    }

    #[test]
    fn test_unknown_decision_label_is_error_even_with_strong_candidate() {
        let raw = json!({ "decision": "CANNOT_ANSWER", "message": "No such data" });
        match normalize(&raw, &candidates(0.9), 0.75) {
            Decision::Error { reason, raw_payload, .. } => {
                assert!(reason.contains("CANNOT_ANSWER"));
                assert_eq!(raw_payload, Some(raw.clone()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_label_is_unrecognized() {
        let raw = json!({ "decision": "MAYBE" });
        assert_eq!(normalize(&raw, &[], 0.75).kind(), "ERROR");
    }
}
