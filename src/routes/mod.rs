pub mod analyzer;
pub mod scatter;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geocode::Coordinates;
use crate::model::CalculatedLoad;

pub use analyzer::{analyze_routes, rank_routes, resolve_coordinates};
pub use scatter::{destination_scatter, DestinationScatter};

/// Aggregate over all loads sharing a normalized (origin, destination)
/// pair. Always derived from the current filtered input in one full
/// recompute; never updated incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub route_key: String,
    pub origin: String,
    pub destination: String,
    pub load_count: usize,
    pub total_gross: f64,
    pub avg_gross: f64,
    pub total_miles: f64,
    pub avg_miles: f64,
    pub total_net_profit: f64,
    pub avg_net_profit: f64,
    pub rate_per_mile: f64,
    pub best_load: CalculatedLoad,
    pub worst_load: CalculatedLoad,
    pub first_drop_date: DateTime<Utc>,
    pub last_drop_date: DateTime<Utc>,
    #[serde(default)]
    pub origin_coords: Option<Coordinates>,
    #[serde(default)]
    pub destination_coords: Option<Coordinates>,
    pub loads: Vec<CalculatedLoad>,
}

impl RouteAnalysis {
    pub fn profit_band(&self) -> ProfitBand {
        ProfitBand::from_rate(self.rate_per_mile)
    }
}

/// Free-text route filters. A filter matches when either string
/// contains the other after normalization, which is order-independent
/// and deliberately loose ("texas" matches "new texas city").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteFilter {
    #[serde(default)]
    pub pickup: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RouteSortKey {
    #[default]
    LoadCount,
    AvgGross,
    RatePerMile,
    AvgNetProfit,
}

impl Display for RouteSortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::LoadCount => "loads",
            Self::AvgGross => "gross",
            Self::RatePerMile => "rate",
            Self::AvgNetProfit => "profit",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown route sort key: {0}")]
pub struct RouteSortParseError(pub String);

impl FromStr for RouteSortKey {
    type Err = RouteSortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "loads" | "load_count" | "count" => Ok(Self::LoadCount),
            "gross" | "avg_gross" => Ok(Self::AvgGross),
            "rate" | "rate_per_mile" | "rpm" => Ok(Self::RatePerMile),
            "profit" | "net" | "avg_net_profit" => Ok(Self::AvgNetProfit),
            _ => Err(RouteSortParseError(s.to_string())),
        }
    }
}

/// Profitability taxonomy over rate-per-mile, part of the contract
/// with the presentation layer (map marker colors).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfitBand {
    VeryProfitable,
    Profitable,
    Moderate,
    Low,
}

impl ProfitBand {
    pub fn from_rate(rate_per_mile: f64) -> Self {
        if rate_per_mile > 2.5 {
            Self::VeryProfitable
        } else if rate_per_mile > 2.0 {
            Self::Profitable
        } else if rate_per_mile > 1.5 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::VeryProfitable => "#2e7d32",
            Self::Profitable => "#66bb6a",
            Self::Moderate => "#ffa726",
            Self::Low => "#ef5350",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryProfitable => "very profitable",
            Self::Profitable => "profitable",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

const MIN_MARKER_RADIUS_PX: f64 = 6.0;
const MAX_MARKER_RADIUS_PX: f64 = 26.0;
const MARKER_COUNT_CEILING: f64 = 100.0;

/// Marker radius grows linearly with load count up to an assumed
/// ceiling of 100 loads, clamped into the pixel range.
pub fn marker_radius(load_count: usize) -> f64 {
    let ratio = (load_count as f64 / MARKER_COUNT_CEILING).clamp(0.0, 1.0);
    MIN_MARKER_RADIUS_PX + (MAX_MARKER_RADIUS_PX - MIN_MARKER_RADIUS_PX) * ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_band_thresholds_are_exclusive() {
        assert_eq!(ProfitBand::from_rate(2.51), ProfitBand::VeryProfitable);
        assert_eq!(ProfitBand::from_rate(2.5), ProfitBand::Profitable);
        assert_eq!(ProfitBand::from_rate(2.0), ProfitBand::Moderate);
        assert_eq!(ProfitBand::from_rate(1.5), ProfitBand::Low);
        assert_eq!(ProfitBand::from_rate(0.0), ProfitBand::Low);
    }

    #[test]
    fn marker_radius_clamps_to_pixel_range() {
        assert_eq!(marker_radius(0), 6.0);
        assert_eq!(marker_radius(50), 16.0);
        assert_eq!(marker_radius(100), 26.0);
        assert_eq!(marker_radius(1000), 26.0);
    }

    #[test]
    fn parses_route_sort_keys() {
        assert_eq!("rpm".parse::<RouteSortKey>().unwrap(), RouteSortKey::RatePerMile);
        assert_eq!(
            "load-count".parse::<RouteSortKey>().unwrap(),
            RouteSortKey::LoadCount
        );
        assert!("mileage".parse::<RouteSortKey>().is_err());
    }
}
