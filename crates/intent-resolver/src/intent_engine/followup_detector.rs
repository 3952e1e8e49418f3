//! Follow-up and concept-switch detection.
//!
//! A question only counts as a follow-up when the session already resolved a
//! query and the question carries a follow-up cue. Parameter references the
//! previous query cannot take make the follow-up incompatible; naming a topic
//! the previous query does not cover means the user moved on.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::keyword_tables::{concepts_for_query_id, CONCEPTS, FOLLOW_UP_CUES, PARAM_KEYWORDS};
use crate::catalog::QueryCatalog;
use crate::memory::SessionContext;
use crate::utils::TextUtils;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedReference {
    pub keyword: String,
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowUpSignal {
    pub is_follow_up: bool,
    pub last_query_id: String,
    pub matched_concepts: BTreeSet<String>,
    pub incompatible: bool,
    pub unsupported: Vec<UnsupportedReference>,
    pub available_parameters: Vec<String>,
    pub reason: String,
}

pub fn concepts_in_question(words: &[String]) -> BTreeSet<&'static str> {
    CONCEPTS
        .iter()
        .filter(|c| TextUtils::find_phrase(words, c.question_keywords).is_some())
        .map(|c| c.name)
        .collect()
}

pub fn detect(question: &str, context: &SessionContext, catalog: &QueryCatalog) -> Option<FollowUpSignal> {
    let last_query_id = context.last_query_id.as_deref()?;
    let words = TextUtils::words(question);

    let cue = TextUtils::find_phrase(&words, &FOLLOW_UP_CUES)?;
    debug!("Follow-up cue '{}' found, last query {}", cue, last_query_id);

    let available_parameters: Vec<String> = match catalog.get(last_query_id) {
        Some(entry) => entry.param_names(),
        None => context.last_params.keys().cloned().collect(),
    };

    let unsupported: Vec<UnsupportedReference> = PARAM_KEYWORDS
        .iter()
        .filter(|k| TextUtils::contains_phrase(&words, k.keyword))
        .filter(|k| !available_parameters.iter().any(|p| k.parameter.matches(p)))
        .map(|k| UnsupportedReference {
            keyword: k.keyword.to_string(),
            parameter: k.parameter.label().to_string(),
        })
        .collect();

    let last_concepts: BTreeSet<&'static str> = concepts_for_query_id(last_query_id).into_iter().collect();

    if !unsupported.is_empty() {
        let keywords: Vec<&str> = unsupported.iter().map(|u| u.keyword.as_str()).collect();
        info!(
            "Follow-up references parameters {} does not take: {}",
            last_query_id,
            keywords.join(", ")
        );
        return Some(FollowUpSignal {
            is_follow_up: true,
            last_query_id: last_query_id.to_string(),
            matched_concepts: last_concepts.iter().map(|c| c.to_string()).collect(),
            incompatible: true,
            reason: format!(
                "'{}' cannot be applied to {}, which takes: {}",
                keywords.join("', '"),
                last_query_id,
                available_parameters.join(", ")
            ),
            unsupported,
            available_parameters,
        });
    }

    let question_concepts = concepts_in_question(&words);
    if let Some(new_topic) = question_concepts.iter().find(|c| !last_concepts.contains(*c)) {
        info!(
            "Concept switch to '{}' away from {}, treating as a new question",
            new_topic, last_query_id
        );
        return None;
    }

    let matched_concepts: BTreeSet<String> = if question_concepts.is_empty() {
        last_concepts.iter().map(|c| c.to_string()).collect()
    } else {
        question_concepts.iter().map(|c| c.to_string()).collect()
    };

    info!("Follow-up of {} (cue '{}')", last_query_id, cue);
    Some(FollowUpSignal {
        is_follow_up: true,
        last_query_id: last_query_id.to_string(),
        matched_concepts,
        incompatible: false,
        unsupported: Vec::new(),
        available_parameters,
        reason: format!("cue '{}' with no change of topic", cue),
    })
}
