//! Per-load economics: dispatch fee, driver pay and net profit under the
//! two mutually exclusive pay models.

use crate::model::{CalculatedLoad, FeeSchedule, Load, LoadEconomics, PayPlanBook, PayType};

/// Derive the financial facts for one load.
///
/// The two pay models are structurally different and the order of
/// subtraction matters: percentage-of-net pay is computed off the
/// post-fee net, percentage-of-gross pay ignores the fee entirely.
/// Fuel cost is allocated 0/100 to the company under gross pay and
/// split 50/50 under net pay. Nothing is clamped: a fuel-heavy load
/// can legitimately produce negative driver pay.
pub fn calculate(load: &Load, schedule: &FeeSchedule, plans: &PayPlanBook) -> LoadEconomics {
    let fee_percent = schedule.fee_percent(&load.dispatcher);
    let dispatch_fee = load.gross_amount * fee_percent / 100.0;

    let (pay_type, pay_percentage) = plans.plan_for(load.driver_id.as_deref());

    let (driver_pay, company_gas_share, driver_gas_share) = match pay_type {
        PayType::PercentageOfGross => {
            let driver_pay = load.gross_amount * pay_percentage / 100.0;
            (driver_pay, load.gas_amount, 0.0)
        }
        PayType::PercentageOfNet => {
            let gas_split = load.gas_amount * 0.5;
            let driver_pay =
                (load.gross_amount - dispatch_fee) * pay_percentage / 100.0 - gas_split;
            (driver_pay, gas_split, gas_split)
        }
    };

    let net_profit = load.gross_amount - dispatch_fee - driver_pay - company_gas_share;

    LoadEconomics {
        dispatch_fee,
        driver_pay,
        net_profit,
        company_gas_share,
        driver_gas_share,
    }
}

/// Annotate every load with its economics and resolved driver name.
pub fn annotate(loads: &[Load], schedule: &FeeSchedule, plans: &PayPlanBook) -> Vec<CalculatedLoad> {
    loads
        .iter()
        .map(|load| {
            let economics = calculate(load, schedule, plans);
            let driver_name = load
                .driver_id
                .as_deref()
                .and_then(|id| plans.driver_name(id))
                .map(str::to_string);
            CalculatedLoad {
                load: load.clone(),
                economics,
                driver_name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{DriverPayPlan, LoadStatus, DEFAULT_FEE_PERCENT};

    fn load(gross: f64, gas: f64, dispatcher: &str, driver_id: Option<&str>) -> Load {
        Load {
            id: "L-1".to_string(),
            broker: "TQL".to_string(),
            gross_amount: gross,
            miles: 500.0,
            gas_amount: gas,
            drop_date: Utc::now(),
            dispatcher: dispatcher.to_string(),
            driver_id: driver_id.map(str::to_string),
            origin: "Dallas, TX".to_string(),
            destination: "Atlanta, GA".to_string(),
            status: LoadStatus::Factored,
        }
    }

    fn book(pay_type: PayType, pct: f64) -> PayPlanBook {
        PayPlanBook::from_plans(vec![DriverPayPlan {
            driver_id: "d1".to_string(),
            driver_name: Some("Marcus Hill".to_string()),
            pay_type,
            pay_percentage: pct,
        }])
    }

    #[test]
    fn net_pay_model_splits_gas_and_pays_off_post_fee_net() {
        let schedule = FeeSchedule::default();
        let plans = book(PayType::PercentageOfNet, 50.0);
        let economics = calculate(&load(1000.0, 100.0, "A", Some("d1")), &schedule, &plans);

        assert_eq!(economics.dispatch_fee, 120.0);
        assert_eq!(economics.driver_gas_share, 50.0);
        assert_eq!(economics.company_gas_share, 50.0);
        assert_eq!(economics.driver_pay, (1000.0 - 120.0) * 0.5 - 50.0);
        assert_eq!(economics.driver_pay, 390.0);
        assert_eq!(economics.net_profit, 1000.0 - 120.0 - 390.0 - 50.0);
        assert_eq!(economics.net_profit, 440.0);
    }

    #[test]
    fn gross_pay_model_ignores_fee_and_company_eats_gas() {
        let schedule = FeeSchedule::default();
        let plans = book(PayType::PercentageOfGross, 50.0);
        let economics = calculate(&load(1000.0, 100.0, "A", Some("d1")), &schedule, &plans);

        assert_eq!(economics.dispatch_fee, 120.0);
        assert_eq!(economics.driver_pay, 500.0);
        assert_eq!(economics.company_gas_share, 100.0);
        assert_eq!(economics.driver_gas_share, 0.0);
        assert_eq!(economics.net_profit, 280.0);
    }

    #[test]
    fn net_profit_balances_under_both_models() {
        let schedule = FeeSchedule::default();
        for pay_type in [PayType::PercentageOfGross, PayType::PercentageOfNet] {
            let plans = book(pay_type, 65.0);
            let l = load(1875.50, 240.33, "A", Some("d1"));
            let e = calculate(&l, &schedule, &plans);
            let residual =
                l.gross_amount - e.dispatch_fee - e.driver_pay - e.company_gas_share - e.net_profit;
            assert!(residual.abs() < 1e-9, "unbalanced for {pay_type:?}");
        }
    }

    #[test]
    fn missing_driver_defaults_to_half_of_net() {
        let schedule = FeeSchedule::default();
        let plans = PayPlanBook::default();
        let economics = calculate(&load(1000.0, 100.0, "A", None), &schedule, &plans);
        assert_eq!(economics.driver_pay, 390.0);
    }

    #[test]
    fn unknown_dispatcher_uses_default_fee() {
        let schedule = FeeSchedule::new(DEFAULT_FEE_PERCENT);
        let plans = PayPlanBook::default();
        let economics = calculate(&load(2000.0, 0.0, "Nobody", None), &schedule, &plans);
        assert_eq!(economics.dispatch_fee, 240.0);
    }

    #[test]
    fn zero_gas_degenerates_both_models_identically_on_gas_shares() {
        let schedule = FeeSchedule::default();
        for pay_type in [PayType::PercentageOfGross, PayType::PercentageOfNet] {
            let plans = book(pay_type, 50.0);
            let e = calculate(&load(1000.0, 0.0, "A", Some("d1")), &schedule, &plans);
            assert_eq!(e.company_gas_share, 0.0);
            assert_eq!(e.driver_gas_share, 0.0);
        }
    }

    #[test]
    fn heavy_gas_can_drive_net_pay_negative() {
        let schedule = FeeSchedule::default();
        let plans = book(PayType::PercentageOfNet, 10.0);
        let economics = calculate(&load(200.0, 400.0, "A", Some("d1")), &schedule, &plans);
        assert!(economics.driver_pay < 0.0);
    }

    #[test]
    fn annotate_resolves_driver_names() {
        let schedule = FeeSchedule::default();
        let plans = book(PayType::PercentageOfNet, 50.0);
        let loads = vec![load(1000.0, 100.0, "A", Some("d1")), load(900.0, 0.0, "A", None)];
        let annotated = annotate(&loads, &schedule, &plans);
        assert_eq!(annotated[0].driver_name.as_deref(), Some("Marcus Hill"));
        assert!(annotated[1].driver_name.is_none());
    }
}
