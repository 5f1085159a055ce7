//! Advisory data-quality audit. Nothing here refuses to compute; the
//! calculator applies documented defaults regardless. These findings
//! exist so the hosting product can surface configuration drift that
//! the name-keyed joins would otherwise swallow silently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Dataset;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityIssue {
    /// Two fee-schedule entries collapse onto the same dispatcher once
    /// case and whitespace are ignored; loads will join to only one.
    DuplicateDispatcherName { names: Vec<String> },
    /// Fee or pay percentage outside [0, 100]. Accepted by the
    /// calculator, which is why it is worth flagging.
    PercentOutOfRange {
        subject: String,
        percent: f64,
    },
    /// A load references a driver id with no pay plan; the default
    /// plan (50% of net) applies.
    UnknownDriver { load_id: String, driver_id: String },
    /// Non-positive miles; rate-per-mile degrades to zero.
    NonPositiveMiles { load_id: String, miles: f64 },
}

pub fn audit(dataset: &Dataset) -> Vec<DataQualityIssue> {
    let mut issues = Vec::new();

    let mut by_folded: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for fee in &dataset.dispatcher_fees {
        let folded = fee
            .dispatcher
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        by_folded
            .entry(folded)
            .or_default()
            .push(fee.dispatcher.clone());
    }
    for (_, mut names) in by_folded {
        if names.len() > 1 {
            names.sort();
            names.dedup();
            if names.len() > 1 {
                issues.push(DataQualityIssue::DuplicateDispatcherName { names });
            }
        }
    }

    for fee in &dataset.dispatcher_fees {
        if !(0.0..=100.0).contains(&fee.fee_percent) {
            issues.push(DataQualityIssue::PercentOutOfRange {
                subject: format!("dispatcher fee: {}", fee.dispatcher),
                percent: fee.fee_percent,
            });
        }
    }
    for plan in &dataset.pay_plans {
        if !(0.0..=100.0).contains(&plan.pay_percentage) {
            issues.push(DataQualityIssue::PercentOutOfRange {
                subject: format!("driver pay: {}", plan.driver_id),
                percent: plan.pay_percentage,
            });
        }
    }

    let book = dataset.pay_plan_book();
    for load in &dataset.loads {
        if let Some(driver_id) = &load.driver_id {
            if !book.contains(driver_id) {
                issues.push(DataQualityIssue::UnknownDriver {
                    load_id: load.id.clone(),
                    driver_id: driver_id.clone(),
                });
            }
        }
        if load.miles <= 0.0 {
            issues.push(DataQualityIssue::NonPositiveMiles {
                load_id: load.id.clone(),
                miles: load.miles,
            });
        }
    }

    issues
}
