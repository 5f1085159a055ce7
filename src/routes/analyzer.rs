use std::collections::HashMap;

use crate::geocode::{normalize_place, GeocodeCache};
use crate::model::CalculatedLoad;
use crate::routes::{RouteAnalysis, RouteFilter, RouteSortKey};

/// Group the filtered loads by normalized (origin, destination) pair
/// and compute per-route statistics. Groups keep first-seen order;
/// ranking is a separate step.
pub fn analyze_routes(loads: &[CalculatedLoad], filter: &RouteFilter) -> Vec<RouteAnalysis> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&CalculatedLoad>> = Vec::new();
    let mut keys: Vec<String> = Vec::new();

    for calculated in loads {
        if !matches_route_filter(calculated, filter) {
            continue;
        }
        let key = format!(
            "{}-{}",
            normalize_place(&calculated.load.origin),
            normalize_place(&calculated.load.destination)
        );
        match index.get(&key) {
            Some(&slot) => groups[slot].push(calculated),
            None => {
                index.insert(key.clone(), groups.len());
                keys.push(key);
                groups.push(vec![calculated]);
            }
        }
    }

    keys.into_iter()
        .zip(groups)
        .map(|(key, group)| summarize_group(key, &group))
        .collect()
}

fn matches_route_filter(calculated: &CalculatedLoad, filter: &RouteFilter) -> bool {
    bidirectional_match(filter.pickup.as_deref(), &calculated.load.origin)
        && bidirectional_match(filter.destination.as_deref(), &calculated.load.destination)
}

/// Either string containing the other counts as a match. Known
/// precision limitation, kept deliberately.
fn bidirectional_match(filter: Option<&str>, value: &str) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let filter = normalize_place(filter);
    if filter.is_empty() {
        return true;
    }
    let value = normalize_place(value);
    value.contains(&filter) || filter.contains(&value)
}

fn summarize_group(route_key: String, group: &[&CalculatedLoad]) -> RouteAnalysis {
    let first = group[0];
    let load_count = group.len();

    let mut total_gross = 0.0;
    let mut total_miles = 0.0;
    let mut total_net_profit = 0.0;
    let mut best = first;
    let mut worst = first;
    let mut first_drop = first.load.drop_date;
    let mut last_drop = first.load.drop_date;

    for calculated in group.iter().copied() {
        total_gross += calculated.load.gross_amount;
        total_miles += calculated.load.miles;
        total_net_profit += calculated.economics.net_profit;
        if calculated.load.gross_amount > best.load.gross_amount {
            best = calculated;
        }
        if calculated.load.gross_amount < worst.load.gross_amount {
            worst = calculated;
        }
        if calculated.load.drop_date < first_drop {
            first_drop = calculated.load.drop_date;
        }
        if calculated.load.drop_date > last_drop {
            last_drop = calculated.load.drop_date;
        }
    }

    let count = load_count as f64;
    let rate_per_mile = if total_miles > 0.0 {
        total_gross / total_miles
    } else {
        0.0
    };

    RouteAnalysis {
        route_key,
        origin: first.load.origin.trim().to_string(),
        destination: first.load.destination.trim().to_string(),
        load_count,
        total_gross,
        avg_gross: total_gross / count,
        total_miles,
        avg_miles: total_miles / count,
        total_net_profit,
        avg_net_profit: total_net_profit / count,
        rate_per_mile,
        best_load: best.clone(),
        worst_load: worst.clone(),
        first_drop_date: first_drop,
        last_drop_date: last_drop,
        origin_coords: None,
        destination_coords: None,
        loads: group.iter().map(|l| (*l).clone()).collect(),
    }
}

/// Stable descending sort on the chosen statistic.
pub fn rank_routes(routes: &mut [RouteAnalysis], key: RouteSortKey) {
    routes.sort_by(|a, b| match key {
        RouteSortKey::LoadCount => b.load_count.cmp(&a.load_count),
        RouteSortKey::AvgGross => b.avg_gross.total_cmp(&a.avg_gross),
        RouteSortKey::RatePerMile => b.rate_per_mile.total_cmp(&a.rate_per_mile),
        RouteSortKey::AvgNetProfit => b.avg_net_profit.total_cmp(&a.avg_net_profit),
    });
}

/// Fill in endpoint coordinates through the cache. A route may end up
/// with zero, one or two resolved endpoints; that is tolerated, and
/// routes sharing an endpoint hit the provider only once.
pub async fn resolve_coordinates(routes: &mut [RouteAnalysis], cache: &GeocodeCache) {
    for route in routes.iter_mut() {
        route.origin_coords = cache.resolve(&route.origin).await;
        route.destination_coords = cache.resolve(&route.destination).await;
    }
}
