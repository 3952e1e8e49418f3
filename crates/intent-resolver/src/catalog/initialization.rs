//! Fixed initialization timestamps per catalog entry.
//!
//! The external decision source cannot know the vintage of the underlying data,
//! so initialization parameters are always taken from this table.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_FORECAST_INIT: &str = "2026-01-09 12:00";
pub const DEFAULT_SEASONAL_INIT: &str = "2025-12-05 00:00";

pub const INITIALIZATION: &str = "initialization";
pub const FORECAST_INIT: &str = "forecast_init";
pub const SEASONAL_INIT: &str = "seasonal_init";

lazy_static! {
    /// Queries spanning the short-term forecast and the seasonal outlook
    static ref FORECAST_AND_SEASONAL: HashSet<&'static str> = [
        "WEATHER_SINGLE_PATH_TS",
        "GSI_P99_PEAK_SEASONAL",
        "GSI_P50_P90_MONTH",
        "P99_RTO_LOAD_MORNING_PEAK",
        "PROBABILITY_RTO_LOAD_EXCEEDS",
        "VOLATILITY_PEAK_NET_DEMAND",
    ]
    .into_iter()
    .collect();

    static ref SEASONAL_ONLY: HashSet<&'static str> = [
        "LOAD_RANGE_P99_P01_DATE",
        "VARIANCE_WIND_VS_SOLAR_MONTH",
        "PROBABILITY_NET_DEMAND_EXCEEDS_MONTH",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationTable {
    forecast_init: String,
    seasonal_init: String,
}

impl Default for InitializationTable {
    fn default() -> Self {
        Self::new(DEFAULT_FORECAST_INIT, DEFAULT_SEASONAL_INIT)
    }
}

impl InitializationTable {
    pub fn new(forecast_init: impl Into<String>, seasonal_init: impl Into<String>) -> Self {
        Self {
            forecast_init: forecast_init.into(),
            seasonal_init: seasonal_init.into(),
        }
    }

    pub fn forecast_init(&self) -> &str {
        &self.forecast_init
    }

    pub fn seasonal_init(&self) -> &str {
        &self.seasonal_init
    }

    /// Initialization values a query must run with. Most queries take a single
    /// `initialization`; seasonal ones take `seasonal_init`, and queries spanning
    /// both horizons take `forecast_init` plus `seasonal_init`.
    pub fn for_query(&self, query_id: &str) -> BTreeMap<&'static str, String> {
        let mut values = BTreeMap::new();
        if FORECAST_AND_SEASONAL.contains(query_id) {
            values.insert(FORECAST_INIT, self.forecast_init.clone());
            values.insert(SEASONAL_INIT, self.seasonal_init.clone());
        } else if SEASONAL_ONLY.contains(query_id) {
            values.insert(SEASONAL_INIT, self.seasonal_init.clone());
        } else {
            values.insert(INITIALIZATION, self.forecast_init.clone());
        }
        values
    }
}
