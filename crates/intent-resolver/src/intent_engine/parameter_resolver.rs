//! Final parameter values for a chosen query: explicit values from the decision
//! source, then values carried over from the session, then schema defaults,
//! with the fixed model-run timestamps applied last.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use tracing::debug;

use crate::catalog::{InitializationTable, QueryCatalog};
use crate::config::Config;
use crate::memory::{Params, SessionContext};

/// Placeholder the decision source writes for a value it could not determine
pub const NEED_MORE_INFO_MARKER: &str = "NEED_MORE_INFO";

const LOCATION: &str = "location";
const PROJECT_PARAMS: &[&str] = &["project_name", "project"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingParam {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamResolution {
    pub resolved: Params,
    pub missing: Vec<MissingParam>,
}

impl ParamResolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Clarification listing every missing parameter by its description
    pub fn clarification(&self) -> String {
        let mut msg = String::from("I need a bit more information to run this query:");
        for param in &self.missing {
            let _ = write!(msg, "\n• {}", param.description);
        }
        msg
    }
}

/// Map user and model spellings of a zone onto canonical location ids.
/// Unrecognized values pass through untouched.
pub fn normalize_location(raw: &str) -> String {
    let canonical = match raw.trim().to_lowercase().as_str() {
        "rto" | "ercot" | "ercot-wide" | "ercot wide" | "ercot-wide (rto)" => "rto",
        "north" | "north zone" | "north load zone" | "north_raybn" => "north_raybn",
        "south" | "south zone" | "south load zone" | "south_lcra_aen_cps" => "south_lcra_aen_cps",
        "west" | "west zone" | "west load zone" => "west",
        "houston" | "houston zone" | "houston load zone" => "houston",
        _ => return raw.to_string(),
    };
    canonical.to_string()
}

fn is_marker(value: &Value) -> bool {
    value
        .as_str()
        .map_or(false, |s| s.trim().eq_ignore_ascii_case(NEED_MORE_INFO_MARKER))
}

/// A value the decision source actually supplied
fn concrete(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty() && !is_marker(v),
        _ => true,
    })
}

fn location_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct ParameterResolver {
    project: String,
    default_location: String,
    initialization: InitializationTable,
}

impl ParameterResolver {
    pub fn new(project: impl Into<String>, default_location: impl Into<String>, initialization: InitializationTable) -> Self {
        Self {
            project: project.into(),
            default_location: default_location.into(),
            initialization,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.default_project.clone(),
            config.default_location.clone(),
            config.initialization_table(),
        )
    }

    /// Decision source value, then the session's last location, then the default zone.
    pub fn resolve_location(&self, explicit: Option<&Value>, carried: Option<&Value>) -> String {
        concrete(explicit)
            .and_then(location_text)
            .or_else(|| carried.and_then(location_text))
            .map(|raw| normalize_location(&raw))
            .unwrap_or_else(|| self.default_location.clone())
    }

    pub fn resolve(
        &self,
        catalog: &QueryCatalog,
        query_id: &str,
        llm_params: &Params,
        context: &SessionContext,
    ) -> Result<ParamResolution> {
        let entry = catalog
            .get(query_id)
            .with_context(|| format!("Unknown query id {}", query_id))?;
        let init_values = self.initialization.for_query(query_id);
        let mut resolution = ParamResolution::default();

        for (name, spec) in &entry.parameters {
            if PROJECT_PARAMS.contains(&name.as_str()) {
                resolution.resolved.insert(name.clone(), Value::String(self.project.clone()));
                continue;
            }
            if name == LOCATION {
                let location = self.resolve_location(llm_params.get(LOCATION), context.last_params.get(LOCATION));
                resolution.resolved.insert(name.clone(), Value::String(location));
                continue;
            }
            if init_values.contains_key(name.as_str()) {
                continue;
            }

            let explicit = llm_params.get(name);
            let carried = context.last_params.get(name).filter(|v| !v.is_null());

            let value = if explicit.map_or(false, is_marker) {
                carried.cloned()
            } else {
                concrete(explicit).or(carried).cloned()
            };

            match value {
                Some(value) => {
                    resolution.resolved.insert(name.clone(), value);
                }
                None if spec.required => resolution.missing.push(MissingParam {
                    name: name.clone(),
                    description: spec.description.clone(),
                }),
                None => {
                    if let Some(default) = &spec.default {
                        resolution.resolved.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        for (name, value) in init_values {
            if entry.has_param(name) {
                resolution.resolved.insert(name.to_string(), Value::String(value));
            }
        }

        debug!(
            "Resolved {} parameters for {} ({} missing)",
            resolution.resolved.len(),
            query_id,
            resolution.missing.len()
        );
        Ok(resolution)
    }
}
