//! Static description of the deployment, used to answer meta questions
//! ("which zones do you cover?") without touching the catalog or the decision source.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemInfoKind {
    Project,
    Locations,
    Capabilities,
}

impl SystemInfoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemInfoKind::Project => "project",
            SystemInfoKind::Locations => "locations",
            SystemInfoKind::Capabilities => "capabilities",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Zone {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct DataCategory {
    pub name: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

pub const ZONES: &[Zone] = &[
    Zone { id: "rto", name: "RTO", description: "ERCOT-wide (entire grid)" },
    Zone { id: "north_raybn", name: "North", description: "North Load Zone" },
    Zone { id: "south_lcra_aen_cps", name: "South", description: "South Load Zone" },
    Zone { id: "west", name: "West", description: "West Load Zone" },
    Zone { id: "houston", name: "Houston", description: "Houston Load Zone" },
];

pub const DATA_CATEGORIES: &[DataCategory] = &[
    DataCategory {
        name: "Grid Stress (GSI)",
        description: "Peak stress probabilities, scarcity events, stress duration",
        example: "What is the peak probability of GSI > 0.60 in next 14 days?",
    },
    DataCategory {
        name: "Load & Temperature",
        description: "Extreme forecasts, load-temperature correlations, peak load predictions",
        example: "Show me average RTO load when temperature drops below -5°C",
    },
    DataCategory {
        name: "Renewables",
        description: "Wind/solar forecasts, Dunkelflaute probability, ramp rate analysis",
        example: "What is the probability of Dunkelflaute?",
    },
    DataCategory {
        name: "Zonal Analysis",
        description: "Zone comparisons, constraint risks, load distribution",
        example: "Compare North vs West zone load spread in P99 scenario",
    },
    DataCategory {
        name: "Advanced Planning",
        description: "Tail risks, uncertainty analysis, extreme scenarios",
        example: "Calculate the net demand uncertainty (P95 - P05)",
    },
];

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub project: String,
    pub project_description: String,
    pub ensemble_paths: u32,
    pub forecast_horizon: String,
    pub forecast_init: String,
    pub seasonal_init: String,
}

impl SystemInfo {
    pub fn new(project: &str, forecast_init: &str, seasonal_init: &str) -> Self {
        Self {
            project: project.to_string(),
            project_description: "ERCOT Texas grid".to_string(),
            ensemble_paths: 1000,
            forecast_horizon: "336 hours (14 days)".to_string(),
            forecast_init: forecast_init.to_string(),
            seasonal_init: seasonal_init.to_string(),
        }
    }

    pub fn message(&self, kind: SystemInfoKind) -> String {
        match kind {
            SystemInfoKind::Project => self.project_message(),
            SystemInfoKind::Locations => self.locations_message(),
            SystemInfoKind::Capabilities => self.capabilities_message(),
        }
    }

    fn project_message(&self) -> String {
        let zone_names: Vec<&str> = ZONES.iter().map(|z| z.name).collect();
        let mut msg = String::new();
        let _ = writeln!(msg, "I work with the **{}** project ({}).", self.project, self.project_description);
        let _ = writeln!(msg);
        let _ = writeln!(msg, "**Available Data**:");
        let _ = writeln!(msg, "• {} load zones ({})", ZONES.len(), zone_names.join(", "));
        let _ = writeln!(msg, "• {} probabilistic ensemble paths", self.ensemble_paths);
        let _ = writeln!(msg, "• {} + seasonal outlook", self.forecast_horizon);
        let _ = writeln!(
            msg,
            "• Forecast initialized {}, seasonal outlook initialized {}",
            self.forecast_init, self.seasonal_init
        );
        let _ = writeln!(msg);
        let _ = write!(msg, "Example: '{}'", DATA_CATEGORIES[0].example);
        msg
    }

    fn locations_message(&self) -> String {
        let mut msg = String::from("**Available Locations**:\n");
        for zone in ZONES {
            let _ = writeln!(msg, "• {} - {}", zone.id, zone.description);
        }
        let _ = write!(
            msg,
            "\nI can query forecast data for any of these {} locations!\n\nExample: '{}'",
            ZONES.len(),
            DATA_CATEGORIES[1].example
        );
        msg
    }

    fn capabilities_message(&self) -> String {
        let mut msg = String::from("I can help you query ERCOT energy forecast data in these areas:\n\n");
        for category in DATA_CATEGORIES {
            let _ = writeln!(msg, "**{}** - {}", category.name, category.description);
        }
        msg.push_str("\nExample queries:\n");
        for category in DATA_CATEGORIES.iter().take(3) {
            let _ = writeln!(msg, "• '{}'", category.example);
        }
        msg
    }
}
