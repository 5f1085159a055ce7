use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dispatch fee applied when a dispatcher has no configured rate.
pub const DEFAULT_FEE_PERCENT: f64 = 12.0;
/// Driver pay share applied when a driver has no configured plan.
pub const DEFAULT_PAY_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Factored,
    NotYetFactored,
}

impl Display for LoadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Factored => "Factored",
            Self::NotYetFactored => "Not Yet Factored",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown load status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for LoadStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "factored" => Ok(Self::Factored),
            "not_yet_factored" | "unfactored" => Ok(Self::NotYetFactored),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// One transported shipment record, as handed over by load storage.
/// Assumed already scoped to the correct tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: String,
    pub broker: String,
    pub gross_amount: f64,
    pub miles: f64,
    pub gas_amount: f64,
    pub drop_date: DateTime<Utc>,
    pub dispatcher: String,
    #[serde(default)]
    pub driver_id: Option<String>,
    pub origin: String,
    pub destination: String,
    pub status: LoadStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayType {
    PercentageOfGross,
    PercentageOfNet,
}

impl Display for PayType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::PercentageOfGross => "% of gross",
            Self::PercentageOfNet => "% of net",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown pay type: {0}")]
pub struct PayTypeParseError(pub String);

impl FromStr for PayType {
    type Err = PayTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "percentage_of_gross" | "gross" => Ok(Self::PercentageOfGross),
            "percentage_of_net" | "net" => Ok(Self::PercentageOfNet),
            _ => Err(PayTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPayPlan {
    pub driver_id: String,
    #[serde(default)]
    pub driver_name: Option<String>,
    pub pay_type: PayType,
    #[serde(default = "default_pay_percentage")]
    pub pay_percentage: f64,
}

fn default_pay_percentage() -> f64 {
    DEFAULT_PAY_PERCENT
}

/// Driver id -> pay plan. Drivers without a plan fall back to
/// percentage-of-net at the default share.
#[derive(Debug, Clone, Default)]
pub struct PayPlanBook {
    plans: BTreeMap<String, DriverPayPlan>,
}

impl PayPlanBook {
    pub fn from_plans(plans: Vec<DriverPayPlan>) -> Self {
        let plans = plans
            .into_iter()
            .map(|plan| (plan.driver_id.clone(), plan))
            .collect();
        Self { plans }
    }

    pub fn plan_for(&self, driver_id: Option<&str>) -> (PayType, f64) {
        driver_id
            .and_then(|id| self.plans.get(id))
            .map(|plan| (plan.pay_type, plan.pay_percentage))
            .unwrap_or((PayType::PercentageOfNet, DEFAULT_PAY_PERCENT))
    }

    pub fn driver_name(&self, driver_id: &str) -> Option<&str> {
        self.plans
            .get(driver_id)
            .and_then(|plan| plan.driver_name.as_deref())
    }

    pub fn contains(&self, driver_id: &str) -> bool {
        self.plans.contains_key(driver_id)
    }

    pub fn plans(&self) -> impl Iterator<Item = &DriverPayPlan> {
        self.plans.values()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherFee {
    pub dispatcher: String,
    pub fee_percent: f64,
}

/// Dispatcher name -> fee percent. Keyed by free-text name, not an id;
/// names are the only correlation available in the load records, so
/// renamed or duplicated dispatchers collapse into one key (the audit
/// module surfaces near-collisions).
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    rates: BTreeMap<String, f64>,
    default_percent: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_PERCENT)
    }
}

impl FeeSchedule {
    pub fn new(default_percent: f64) -> Self {
        Self {
            rates: BTreeMap::new(),
            default_percent,
        }
    }

    pub fn from_fees(fees: &[DispatcherFee], default_percent: f64) -> Self {
        let mut schedule = Self::new(default_percent);
        for fee in fees {
            schedule.set_rate(&fee.dispatcher, fee.fee_percent);
        }
        schedule
    }

    pub fn set_rate(&mut self, dispatcher: &str, fee_percent: f64) {
        self.rates.insert(dispatcher.to_string(), fee_percent);
    }

    pub fn fee_percent(&self, dispatcher: &str) -> f64 {
        self.rates
            .get(dispatcher)
            .copied()
            .unwrap_or(self.default_percent)
    }

    pub fn rates(&self) -> &BTreeMap<String, f64> {
        &self.rates
    }
}

/// Financial facts derived from one load under the configured fee and
/// pay model. Never persisted; recomputed from configs on every pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LoadEconomics {
    pub dispatch_fee: f64,
    pub driver_pay: f64,
    pub net_profit: f64,
    pub company_gas_share: f64,
    pub driver_gas_share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedLoad {
    #[serde(flatten)]
    pub load: Load,
    #[serde(flatten)]
    pub economics: LoadEconomics,
    #[serde(default)]
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Dispatcher,
    Owner,
}

#[derive(Debug, Error)]
#[error("unknown viewer role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for ViewerRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dispatcher" | "driver" => Ok(Self::Dispatcher),
            "owner" | "company" | "admin" => Ok(Self::Owner),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// The JSON hand-off format from load and configuration storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub dispatcher_fees: Vec<DispatcherFee>,
    #[serde(default)]
    pub pay_plans: Vec<DriverPayPlan>,
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading dataset: {}", path.display()))?;
        let parsed: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed parsing dataset JSON: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn fee_schedule(&self, default_percent: f64) -> FeeSchedule {
        FeeSchedule::from_fees(&self.dispatcher_fees, default_percent)
    }

    pub fn pay_plan_book(&self) -> PayPlanBook {
        PayPlanBook::from_plans(self.pay_plans.clone())
    }

    pub fn sample() -> Self {
        let dropped = |y, m, d| {
            Utc.with_ymd_and_hms(y, m, d, 15, 30, 0)
                .single()
                .expect("valid sample timestamp")
        };
        Self {
            loads: vec![
                Load {
                    id: "L-1001".to_string(),
                    broker: "TQL".to_string(),
                    gross_amount: 1000.0,
                    miles: 480.0,
                    gas_amount: 100.0,
                    drop_date: dropped(2024, 3, 4),
                    dispatcher: "Alice Moreno".to_string(),
                    driver_id: Some("d1".to_string()),
                    origin: "Dallas, TX".to_string(),
                    destination: "Atlanta, GA".to_string(),
                    status: LoadStatus::Factored,
                },
                Load {
                    id: "L-1002".to_string(),
                    broker: "Coyote".to_string(),
                    gross_amount: 2400.0,
                    miles: 900.0,
                    gas_amount: 260.0,
                    drop_date: dropped(2024, 3, 9),
                    dispatcher: "Alice Moreno".to_string(),
                    driver_id: Some("d2".to_string()),
                    origin: "Atlanta, GA".to_string(),
                    destination: "Chicago, IL".to_string(),
                    status: LoadStatus::NotYetFactored,
                },
                Load {
                    id: "L-1003".to_string(),
                    broker: "TQL".to_string(),
                    gross_amount: 1800.0,
                    miles: 480.0,
                    gas_amount: 150.0,
                    drop_date: dropped(2024, 3, 12),
                    dispatcher: "Ben Ortiz".to_string(),
                    driver_id: None,
                    origin: " dallas,  tx ".to_string(),
                    destination: "Atlanta, GA".to_string(),
                    status: LoadStatus::Factored,
                },
            ],
            dispatcher_fees: vec![DispatcherFee {
                dispatcher: "Alice Moreno".to_string(),
                fee_percent: 12.0,
            }],
            pay_plans: vec![
                DriverPayPlan {
                    driver_id: "d1".to_string(),
                    driver_name: Some("Marcus Hill".to_string()),
                    pay_type: PayType::PercentageOfNet,
                    pay_percentage: 50.0,
                },
                DriverPayPlan {
                    driver_id: "d2".to_string(),
                    driver_name: Some("Pete Novak".to_string()),
                    pay_type: PayType::PercentageOfGross,
                    pay_percentage: 50.0,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_schedule_falls_back_to_default() {
        let schedule = FeeSchedule::from_fees(
            &[DispatcherFee {
                dispatcher: "Alice Moreno".to_string(),
                fee_percent: 9.0,
            }],
            DEFAULT_FEE_PERCENT,
        );
        assert_eq!(schedule.fee_percent("Alice Moreno"), 9.0);
        assert_eq!(schedule.fee_percent("Nobody"), 12.0);
    }

    #[test]
    fn pay_plan_book_defaults_to_half_of_net() {
        let book = PayPlanBook::default();
        let (pay_type, pct) = book.plan_for(Some("missing"));
        assert_eq!(pay_type, PayType::PercentageOfNet);
        assert_eq!(pct, 50.0);
        let (pay_type, _) = book.plan_for(None);
        assert_eq!(pay_type, PayType::PercentageOfNet);
    }

    #[test]
    fn parses_status_and_pay_type() {
        assert_eq!(
            "not yet factored".parse::<LoadStatus>().unwrap(),
            LoadStatus::NotYetFactored
        );
        assert_eq!(
            "percentage_of_gross".parse::<PayType>().unwrap(),
            PayType::PercentageOfGross
        );
        assert!("weekly_salary".parse::<PayType>().is_err());
    }

    #[test]
    fn dataset_round_trips_through_json() {
        let dataset = Dataset::sample();
        let json = serde_json::to_string(&dataset).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back.loads.len(), dataset.loads.len());
        assert_eq!(back.pay_plans.len(), dataset.pay_plans.len());
    }
}
