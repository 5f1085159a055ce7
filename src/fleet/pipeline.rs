use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::fleet::{LoadFilter, LoadSortKey, Page, RevenueBucket, SortDirection};
use crate::model::{CalculatedLoad, ViewerRole};

/// Newest drop date first; ties keep their original order.
pub fn default_order(loads: &mut [CalculatedLoad]) {
    loads.sort_by(|a, b| b.load.drop_date.cmp(&a.load.drop_date));
}

pub fn apply_filter(loads: &[CalculatedLoad], filter: &LoadFilter) -> Vec<CalculatedLoad> {
    loads
        .iter()
        .filter(|calculated| matches_filter(calculated, filter))
        .cloned()
        .collect()
}

fn matches_filter(calculated: &CalculatedLoad, filter: &LoadFilter) -> bool {
    let load = &calculated.load;

    if let Some(search) = filter.search.as_deref() {
        let query = search.trim().to_lowercase();
        if !query.is_empty() {
            let haystacks = [&load.broker, &load.origin, &load.destination];
            if !haystacks
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
            {
                return false;
            }
        }
    }

    if let Some(driver_id) = filter.driver_id.as_deref() {
        if load.driver_id.as_deref() != Some(driver_id) {
            return false;
        }
    }

    in_window(load.drop_date, filter.date_from, filter.date_to)
}

fn in_window(ts: DateTime<Utc>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    if let Some(from) = from {
        let start = from.and_hms_opt(0, 0, 0).expect("valid day start").and_utc();
        if ts < start {
            return false;
        }
    }
    if let Some(to) = to {
        let end = to
            .and_hms_milli_opt(23, 59, 59, 999)
            .expect("valid day end")
            .and_utc();
        if ts > end {
            return false;
        }
    }
    true
}

/// Stable sort on any calculated-load column. Strings compare
/// case-insensitively, numbers by total order, dates by timestamp.
pub fn sort_loads(loads: &mut [CalculatedLoad], key: LoadSortKey, direction: SortDirection) {
    loads.sort_by(|a, b| {
        let ordering = compare_by_key(a, b, key);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn compare_by_key(a: &CalculatedLoad, b: &CalculatedLoad, key: LoadSortKey) -> Ordering {
    match key {
        LoadSortKey::DropDate => a.load.drop_date.cmp(&b.load.drop_date),
        LoadSortKey::Broker => cmp_text(&a.load.broker, &b.load.broker),
        LoadSortKey::Origin => cmp_text(&a.load.origin, &b.load.origin),
        LoadSortKey::Destination => cmp_text(&a.load.destination, &b.load.destination),
        LoadSortKey::Dispatcher => cmp_text(&a.load.dispatcher, &b.load.dispatcher),
        LoadSortKey::Driver => cmp_text(driver_label(a), driver_label(b)),
        LoadSortKey::Status => cmp_text(&a.load.status.to_string(), &b.load.status.to_string()),
        LoadSortKey::Gross => a.load.gross_amount.total_cmp(&b.load.gross_amount),
        LoadSortKey::Miles => a.load.miles.total_cmp(&b.load.miles),
        LoadSortKey::GasAmount => a.load.gas_amount.total_cmp(&b.load.gas_amount),
        LoadSortKey::DispatchFee => a
            .economics
            .dispatch_fee
            .total_cmp(&b.economics.dispatch_fee),
        LoadSortKey::DriverPay => a.economics.driver_pay.total_cmp(&b.economics.driver_pay),
        LoadSortKey::NetProfit => a.economics.net_profit.total_cmp(&b.economics.net_profit),
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Missing driver fields normalize to the empty string for comparison.
fn driver_label(calculated: &CalculatedLoad) -> &str {
    calculated
        .driver_name
        .as_deref()
        .or(calculated.load.driver_id.as_deref())
        .unwrap_or("")
}

pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let page_count = total.div_ceil(page_size);
    let page = page.clamp(1, page_count.max(1));

    let start = (page - 1) * page_size;
    let items: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        page_count,
        total,
    }
}

/// Bucket the filter-respecting (not paginated) set by driver when the
/// viewer is a dispatcher, by dispatcher name otherwise. First-seen
/// order is preserved for stable chart series.
pub fn revenue_buckets(loads: &[CalculatedLoad], role: ViewerRole) -> Vec<RevenueBucket> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<RevenueBucket> = Vec::new();

    for calculated in loads {
        let (key, label) = match role {
            ViewerRole::Dispatcher => {
                let key = calculated
                    .load
                    .driver_id
                    .clone()
                    .unwrap_or_else(|| "unassigned".to_string());
                let label = match driver_label(calculated) {
                    "" => "Unassigned".to_string(),
                    name => name.to_string(),
                };
                (key, label)
            }
            ViewerRole::Owner => (
                calculated.load.dispatcher.clone(),
                calculated.load.dispatcher.clone(),
            ),
        };

        let slot = *index.entry(key).or_insert_with(|| {
            buckets.push(RevenueBucket {
                name: label,
                gross: 0.0,
                load_count: 0,
            });
            buckets.len() - 1
        });
        buckets[slot].gross += calculated.load.gross_amount;
        buckets[slot].load_count += 1;
    }

    buckets
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::economics::annotate;
    use crate::model::Dataset;

    fn annotated() -> Vec<CalculatedLoad> {
        let dataset = Dataset::sample();
        let schedule = dataset.fee_schedule(12.0);
        let plans = dataset.pay_plan_book();
        annotate(&dataset.loads, &schedule, &plans)
    }

    #[test]
    fn default_order_is_newest_first() {
        let mut loads = annotated();
        default_order(&mut loads);
        assert_eq!(loads[0].load.id, "L-1003");
        assert_eq!(loads[2].load.id, "L-1001");
    }

    #[test]
    fn search_is_case_insensitive_over_broker_origin_destination() {
        let loads = annotated();
        let filter = LoadFilter {
            search: Some("CHICAGO".to_string()),
            ..LoadFilter::default()
        };
        let hits = apply_filter(&loads, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].load.id, "L-1002");

        let blank = LoadFilter {
            search: Some("   ".to_string()),
            ..LoadFilter::default()
        };
        assert_eq!(apply_filter(&loads, &blank).len(), loads.len());
    }

    #[test]
    fn driver_filter_is_exact() {
        let loads = annotated();
        let filter = LoadFilter {
            driver_id: Some("d1".to_string()),
            ..LoadFilter::default()
        };
        let hits = apply_filter(&loads, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].load.id, "L-1001");
    }

    #[test]
    fn date_window_is_inclusive_at_both_day_bounds() {
        let mut loads = annotated();
        // Drop at 00:00:00.000 and 23:59:59.999 on the boundary days.
        loads[0].load.drop_date = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        loads[1].load.drop_date = Utc
            .with_ymd_and_hms(2024, 3, 9, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(999))
            .unwrap();
        let filter = LoadFilter {
            date_from: Some(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()),
            date_to: Some(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()),
            ..LoadFilter::default()
        };
        let hits = apply_filter(&loads, &filter);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn numeric_sort_double_inversion_restores_order() {
        let mut loads = annotated();
        let original: Vec<String> = loads.iter().map(|l| l.load.id.clone()).collect();
        sort_loads(&mut loads, LoadSortKey::Gross, SortDirection::Desc);
        sort_loads(&mut loads, LoadSortKey::Gross, SortDirection::Asc);
        sort_loads(&mut loads, LoadSortKey::Gross, SortDirection::Desc);
        sort_loads(&mut loads, LoadSortKey::Gross, SortDirection::Asc);
        let mut expected = annotated();
        sort_loads(&mut expected, LoadSortKey::Gross, SortDirection::Asc);
        let got: Vec<String> = loads.iter().map(|l| l.load.id.clone()).collect();
        let want: Vec<String> = expected.iter().map(|l| l.load.id.clone()).collect();
        assert_eq!(got, want);
        assert_eq!(original.len(), got.len());
    }

    #[test]
    fn string_sort_ignores_case() {
        let mut loads = annotated();
        loads[0].load.broker = "acme".to_string();
        loads[1].load.broker = "Beta".to_string();
        loads[2].load.broker = "ACORN".to_string();
        sort_loads(&mut loads, LoadSortKey::Broker, SortDirection::Asc);
        let brokers: Vec<&str> = loads.iter().map(|l| l.load.broker.as_str()).collect();
        assert_eq!(brokers, vec!["acme", "ACORN", "Beta"]);
    }

    #[test]
    fn default_directions_match_column_semantics() {
        assert_eq!(
            LoadSortKey::DropDate.default_direction(),
            SortDirection::Desc
        );
        assert_eq!(LoadSortKey::Gross.default_direction(), SortDirection::Desc);
        assert_eq!(LoadSortKey::Broker.default_direction(), SortDirection::Asc);
        assert_eq!(
            LoadSortKey::NetProfit.default_direction(),
            SortDirection::Asc
        );
    }

    #[test]
    fn pagination_counts_hold() {
        let items: Vec<u32> = (0..23).collect();
        let page = paginate(items.clone(), 3, 10);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.items.len(), 23 - 2 * 10);

        let clamped = paginate(items.clone(), 99, 10);
        assert_eq!(clamped.page, 3);

        let empty = paginate(Vec::<u32>::new(), 1, 10);
        assert_eq!(empty.page_count, 0);
        assert_eq!(empty.page, 1);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn owner_buckets_group_by_dispatcher() {
        let loads = annotated();
        let buckets = revenue_buckets(&loads, ViewerRole::Owner);
        assert_eq!(buckets.len(), 2);
        let alice = buckets
            .iter()
            .find(|b| b.name == "Alice Moreno")
            .expect("missing bucket");
        assert_eq!(alice.load_count, 2);
        assert_eq!(alice.gross, 1000.0 + 2400.0);
    }

    #[test]
    fn dispatcher_buckets_group_by_driver_with_name_labels() {
        let loads = annotated();
        let buckets = revenue_buckets(&loads, ViewerRole::Dispatcher);
        let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert!(names.contains(&"Marcus Hill"));
        assert!(names.contains(&"Pete Novak"));
        assert!(names.contains(&"Unassigned"));
    }

    #[test]
    fn rejects_unknown_sort_keys_at_parse_time() {
        assert!("undefined".parse::<LoadSortKey>().is_err());
        assert_eq!(
            "date".parse::<LoadSortKey>().unwrap(),
            LoadSortKey::DropDate
        );
    }
}
