//! Keyword tables for follow-up, concept and meta-question detection.
//!
//! These are hand-maintained: a catalog entry whose id or wording introduces a
//! new concept or parameter family needs a matching row here.

use lazy_static::lazy_static;

use crate::catalog::SystemInfoKind;

/// How a question keyword maps onto a catalog parameter name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMatch {
    /// Parameter name must equal this
    Exact(&'static str),
    /// Any parameter whose name contains this
    Contains(&'static str),
}

impl ParamMatch {
    pub fn matches(&self, param_name: &str) -> bool {
        match self {
            ParamMatch::Exact(name) => param_name == *name,
            ParamMatch::Contains(fragment) => param_name.contains(fragment),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParamMatch::Exact(name) | ParamMatch::Contains(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamKeyword {
    pub keyword: &'static str,
    pub parameter: ParamMatch,
}

#[derive(Debug, Clone, Copy)]
pub struct Concept {
    pub name: &'static str,
    /// Underscore-delimited segments matched against upper-cased catalog ids
    pub id_keywords: &'static [&'static str],
    /// Phrases matched as whole words against the question
    pub question_keywords: &'static [&'static str],
}

lazy_static! {
    pub static ref FOLLOW_UP_CUES: Vec<&'static str> = vec![
        // direct reuse
        "same", "again", "repeat", "redo", "rerun", "once more", "one more time",
        // modification
        "now with", "but for", "change to", "but with", "instead", "also for",
        // explicit reference
        "same query", "previous query", "last query",
    ];

    pub static ref PARAM_KEYWORDS: Vec<ParamKeyword> = vec![
        ParamKeyword { keyword: "threshold", parameter: ParamMatch::Contains("threshold") },
        ParamKeyword { keyword: "zone", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "location", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "houston", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "north", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "south", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "west", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "rto", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "ercot", parameter: ParamMatch::Exact("location") },
        ParamKeyword { keyword: "days", parameter: ParamMatch::Exact("days_ahead") },
        ParamKeyword { keyword: "week", parameter: ParamMatch::Exact("days_ahead") },
        ParamKeyword { keyword: "month", parameter: ParamMatch::Exact("month") },
        ParamKeyword { keyword: "percentile", parameter: ParamMatch::Exact("percentile") },
        ParamKeyword { keyword: "path", parameter: ParamMatch::Exact("ensemble_path") },
    ];

    pub static ref CONCEPTS: Vec<Concept> = vec![
        Concept {
            name: "grid_stress",
            id_keywords: &["GSI"],
            question_keywords: &["gsi", "grid stress", "stress", "scarcity"],
        },
        Concept {
            name: "load",
            id_keywords: &["LOAD", "NET_DEMAND"],
            question_keywords: &["load", "demand"],
        },
        Concept {
            name: "temperature",
            id_keywords: &["TEMP", "COLD", "FREEZING", "DEW"],
            question_keywords: &["temperature", "temp", "cold", "freezing"],
        },
        Concept {
            name: "wind",
            id_keywords: &["WIND", "DUNKELFLAUTE"],
            question_keywords: &["wind"],
        },
        Concept {
            name: "solar",
            id_keywords: &["SOLAR", "GHI", "DUNKELFLAUTE"],
            question_keywords: &["solar", "sun", "ghi"],
        },
        Concept {
            name: "renewable",
            id_keywords: &["RENEWABLE", "WIND", "SOLAR", "DUNKELFLAUTE"],
            question_keywords: &["renewable", "renewables"],
        },
        // "zone" alone is a location reference, not a topic switch
        Concept {
            name: "zonal",
            id_keywords: &["ZONE", "NORTH", "WEST", "SOUTH", "HOUSTON"],
            question_keywords: &["zonal", "zones", "compare zones"],
        },
    ];

    pub static ref SYSTEM_INFO_PATTERNS: Vec<(SystemInfoKind, Vec<&'static str>)> = vec![
        (
            SystemInfoKind::Project,
            vec![
                "what project", "which project", "projects do you", "project available",
                "project information", "tell me about project", "what data do you have",
            ],
        ),
        (
            SystemInfoKind::Locations,
            vec![
                "what location", "which location", "locations served", "location available",
                "what zones", "which zones", "what regions", "which regions", "regions do you",
                "what areas", "which areas",
            ],
        ),
        (
            SystemInfoKind::Capabilities,
            vec![
                "what can you", "what do you", "help me with", "capabilities",
                "what kind of", "what type of",
            ],
        ),
    ];
}

/// Concepts a catalog id belongs to
pub fn concepts_for_query_id(query_id: &str) -> Vec<&'static str> {
    let id = format!("_{}_", query_id.to_uppercase());
    CONCEPTS
        .iter()
        .filter(|c| c.id_keywords.iter().any(|k| id.contains(&format!("_{}_", k))))
        .map(|c| c.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concepts_for_query_id() {
        assert_eq!(concepts_for_query_id("GSI_PEAK_PROBABILITY_14_DAYS"), vec!["grid_stress"]);
        assert_eq!(
            concepts_for_query_id("PROBABILITY_DUNKELFLAUTE"),
            vec!["wind", "solar", "renewable"]
        );
        assert_eq!(concepts_for_query_id("AVG_LOAD_EXTREME_COLD"), vec!["load", "temperature"]);
        assert!(concepts_for_query_id("DATE_HIGHEST_TAIL_RISK").is_empty());
    }

    #[test]
    fn test_id_keywords_match_whole_segments() {
        // LOWEST is not WEST, NONRENEWABLE is not RENEWABLE
        assert_eq!(concepts_for_query_id("MEDIAN_OUTAGE_LOWEST_1_PERCENT_TEMP"), vec!["temperature"]);
        assert_eq!(concepts_for_query_id("LIKELIHOOD_NONRENEWABLE_OUTAGE_COLD_SNAP"), vec!["temperature"]);
        assert_eq!(concepts_for_query_id("VOLATILITY_PEAK_NET_DEMAND"), vec!["load"]);
    }

    #[test]
    fn test_param_match() {
        assert!(ParamMatch::Contains("threshold").matches("gsi_threshold"));
        assert!(!ParamMatch::Exact("location").matches("locations"));
        assert_eq!(ParamMatch::Exact("days_ahead").label(), "days_ahead");
    }

    #[test]
    fn test_zone_maps_to_location_not_concept() {
        let zone = PARAM_KEYWORDS.iter().find(|k| k.keyword == "zone").unwrap();
        assert_eq!(zone.parameter, ParamMatch::Exact("location"));
        assert!(CONCEPTS.iter().all(|c| !c.question_keywords.contains(&"zone")));
    }

    #[test]
    fn test_tables_have_no_duplicate_keywords() {
        let mut keywords: Vec<&str> = PARAM_KEYWORDS.iter().map(|k| k.keyword).collect();
        keywords.sort_unstable();
        keywords.dedup();
        assert_eq!(keywords.len(), PARAM_KEYWORDS.len());

        let mut cues = FOLLOW_UP_CUES.clone();
        cues.sort_unstable();
        cues.dedup();
        assert_eq!(cues.len(), FOLLOW_UP_CUES.len());
    }

    #[test]
    fn test_every_builtin_zonal_id_has_a_concept() {
        let catalog = crate::catalog::QueryCatalog::builtin().unwrap();
        for entry in catalog.entries().iter().filter(|e| e.category == "zonal") {
            assert!(
                !concepts_for_query_id(&entry.id).is_empty(),
                "{} has no concept",
                entry.id
            );
        }
    }
}
