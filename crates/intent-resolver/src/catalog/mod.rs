//! Query catalog - the fixed set of parameterized analytical queries a question can resolve to

pub mod initialization;
pub mod system_info;

pub use initialization::InitializationTable;
pub use system_info::{SystemInfo, SystemInfoKind};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

const BUILTIN_CATALOG: &str = include_str!("catalog.json");

/// Parameters resolved by dedicated helpers rather than a literal default.
pub const HELPER_RESOLVED_PARAMS: &[&str] = &["location", "project_name", "project"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Timestamp,
    Text,
    Integer,
    Float,
    Date,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Timestamp => "timestamp",
            ParamType::Text => "text",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn required(param_type: ParamType, description: &str) -> Self {
        Self {
            param_type,
            required: true,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn optional(param_type: ParamType, default: serde_json::Value, description: &str) -> Self {
        Self {
            param_type,
            required: false,
            default: Some(default),
            description: description.to_string(),
        }
    }
}

/// One catalog entry. Parameters are kept in a `BTreeMap` so every rendering
/// of an entry (embedding text, prompts) walks them in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_question: Option<String>,
}

impl CatalogEntry {
    pub fn has_param(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn param_names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    /// Optional parameters that have neither a default nor a helper to resolve them
    fn unresolvable_optionals(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(name, spec)| {
                !spec.required
                    && spec.default.is_none()
                    && !HELPER_RESOLVED_PARAMS.contains(&name.as_str())
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    version: String,
    entries: Vec<CatalogEntry>,
}

/// Immutable, id-indexed catalog.
#[derive(Debug, Clone)]
pub struct QueryCatalog {
    version: String,
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
}

impl QueryCatalog {
    /// Load the catalog compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("Builtin query catalog is malformed")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument =
            serde_json::from_str(json).context("Failed to parse catalog document")?;
        Self::from_entries(document.version, document.entries)
    }

    pub fn from_entries(version: impl Into<String>, entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(entries.len());

        for (idx, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                anyhow::bail!("Catalog entry at position {} has an empty id", idx);
            }
            if by_id.insert(entry.id.clone(), idx).is_some() {
                anyhow::bail!("Duplicate catalog entry id: {}", entry.id);
            }

            let offenders = entry.unresolvable_optionals();
            if !offenders.is_empty() {
                warn!(
                    "Catalog entry {} has optional parameters without defaults: {}",
                    entry.id,
                    offenders.join(", ")
                );
            }
        }

        let catalog = Self {
            version: version.into(),
            entries,
            by_id,
        };
        info!("Loaded query catalog {} ({} entries)", catalog.version, catalog.len());
        Ok(catalog)
    }

    pub fn empty() -> Self {
        debug!("Creating empty query catalog");
        Self {
            version: String::new(),
            entries: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            description: format!("Description of {}", id),
            category: "grid_stress".to_string(),
            parameters: BTreeMap::new(),
            example_question: None,
        }
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = QueryCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 51);
        assert_eq!(catalog.version(), "2026.01");
        assert!(catalog.contains("GSI_PEAK_PROBABILITY_14_DAYS"));
        assert!(catalog.contains("WEATHER_SINGLE_PATH_TS"));
    }

    #[test]
    fn test_builtin_optional_params_have_defaults_or_helpers() {
        let catalog = QueryCatalog::builtin().unwrap();
        for entry in catalog.entries() {
            assert!(
                entry.unresolvable_optionals().is_empty(),
                "{} has unresolvable optional params",
                entry.id
            );
        }
    }

    #[test]
    fn test_builtin_param_types_parse() {
        let catalog = QueryCatalog::builtin().unwrap();
        let entry = catalog.get("GSI_PEAK_PROBABILITY_14_DAYS").unwrap();

        let init = &entry.parameters["initialization"];
        assert_eq!(init.param_type, ParamType::Timestamp);
        assert!(init.required);

        let threshold = &entry.parameters["gsi_threshold"];
        assert_eq!(threshold.param_type, ParamType::Float);
        assert_eq!(threshold.default, Some(json!(0.6)));

        let target = &catalog.get("LOAD_RANGE_P99_P01_DATE").unwrap().parameters["target_date"];
        assert_eq!(target.param_type, ParamType::Date);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = QueryCatalog::from_entries("test", vec![entry("A"), entry("A")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = QueryCatalog::from_entries("test", vec![entry("  ")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sorted_ids() {
        let catalog = QueryCatalog::from_entries("test", vec![entry("B"), entry("A"), entry("C")]).unwrap();
        assert_eq!(catalog.sorted_ids(), vec!["A", "B", "C"]);
        assert_eq!(catalog.get("B").unwrap().id, "B");
        assert!(catalog.get("Z").is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = QueryCatalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.sorted_ids().is_empty());
    }
}
