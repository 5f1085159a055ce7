pub mod pipeline;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use pipeline::{apply_filter, default_order, paginate, revenue_buckets, sort_loads};

/// Filter criteria for the fleet view. All fields optional; an empty
/// filter matches every load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadFilter {
    /// Case-insensitive substring over broker, origin and destination.
    #[serde(default)]
    pub search: Option<String>,
    /// Exact driver-id match.
    #[serde(default)]
    pub driver_id: Option<String>,
    /// Inclusive, normalized to 00:00:00.000 on the start day.
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Inclusive, normalized to 23:59:59.999 on the end day.
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl LoadFilter {
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, |s| s.trim().is_empty())
            && self.driver_id.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadSortKey {
    #[default]
    DropDate,
    Broker,
    Origin,
    Destination,
    Dispatcher,
    Driver,
    Status,
    Gross,
    Miles,
    GasAmount,
    DispatchFee,
    DriverPay,
    NetProfit,
}

impl LoadSortKey {
    /// Financial and date columns read best newest/largest first.
    pub fn default_direction(self) -> SortDirection {
        match self {
            Self::DropDate | Self::Gross | Self::DispatchFee | Self::DriverPay | Self::Miles => {
                SortDirection::Desc
            }
            _ => SortDirection::Asc,
        }
    }
}

impl Display for LoadSortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::DropDate => "drop_date",
            Self::Broker => "broker",
            Self::Origin => "origin",
            Self::Destination => "destination",
            Self::Dispatcher => "dispatcher",
            Self::Driver => "driver",
            Self::Status => "status",
            Self::Gross => "gross",
            Self::Miles => "miles",
            Self::GasAmount => "gas",
            Self::DispatchFee => "dispatch_fee",
            Self::DriverPay => "driver_pay",
            Self::NetProfit => "net_profit",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown sort key: {0}")]
pub struct SortKeyParseError(pub String);

impl FromStr for LoadSortKey {
    type Err = SortKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "drop_date" | "date" => Ok(Self::DropDate),
            "broker" => Ok(Self::Broker),
            "origin" | "pickup" => Ok(Self::Origin),
            "destination" => Ok(Self::Destination),
            "dispatcher" => Ok(Self::Dispatcher),
            "driver" => Ok(Self::Driver),
            "status" => Ok(Self::Status),
            "gross" | "gross_amount" => Ok(Self::Gross),
            "miles" => Ok(Self::Miles),
            "gas" | "gas_amount" => Ok(Self::GasAmount),
            "dispatch_fee" | "fee" => Ok(Self::DispatchFee),
            "driver_pay" | "pay" => Ok(Self::DriverPay),
            "net_profit" | "net" | "profit" => Ok(Self::NetProfit),
            _ => Err(SortKeyParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Error)]
#[error("unknown sort direction: {0}")]
pub struct DirectionParseError(pub String);

impl FromStr for SortDirection {
    type Err = DirectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(DirectionParseError(s.to_string())),
        }
    }
}

/// One page of results. Page-index state (including resetting to page 1
/// when filter or sort criteria change) belongs to the caller; the
/// requested page is clamped into range here so a stale index never
/// lands on an empty slice while data exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Per-entity revenue rollup for chart consumption. Built from the
/// filtered set, never the paginated slice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueBucket {
    pub name: String,
    pub gross: f64,
    pub load_count: usize,
}
