use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geocode::{normalize_place, Coordinates};
use crate::routes::{marker_radius, ProfitBand, RouteAnalysis};

/// One plotted destination: every route ending there, rolled up.
/// Only routes whose destination geocoded contribute; a marker with no
/// coordinates has nowhere to go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationScatter {
    pub destination: String,
    pub coords: Coordinates,
    pub load_count: usize,
    pub total_gross: f64,
    pub total_net_profit: f64,
    pub avg_rate_per_mile: f64,
    pub band: ProfitBand,
    pub marker_radius: f64,
}

pub fn destination_scatter(routes: &[RouteAnalysis]) -> Vec<DestinationScatter> {
    struct Accumulator {
        destination: String,
        coords: Coordinates,
        load_count: usize,
        total_gross: f64,
        total_miles: f64,
        total_net_profit: f64,
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut accumulators: Vec<Accumulator> = Vec::new();

    for route in routes {
        let Some(coords) = route.destination_coords else {
            continue;
        };
        let key = normalize_place(&route.destination);
        let slot = *index.entry(key).or_insert_with(|| {
            accumulators.push(Accumulator {
                destination: route.destination.clone(),
                coords,
                load_count: 0,
                total_gross: 0.0,
                total_miles: 0.0,
                total_net_profit: 0.0,
            });
            accumulators.len() - 1
        });
        let acc = &mut accumulators[slot];
        acc.load_count += route.load_count;
        acc.total_gross += route.total_gross;
        acc.total_miles += route.total_miles;
        acc.total_net_profit += route.total_net_profit;
    }

    let mut points: Vec<DestinationScatter> = accumulators
        .into_iter()
        .map(|acc| {
            // Weighted by volume across contributing routes, not a mean
            // of per-route rates.
            let avg_rate_per_mile = if acc.total_miles > 0.0 {
                acc.total_gross / acc.total_miles
            } else {
                0.0
            };
            DestinationScatter {
                destination: acc.destination,
                coords: acc.coords,
                load_count: acc.load_count,
                total_gross: acc.total_gross,
                total_net_profit: acc.total_net_profit,
                avg_rate_per_mile,
                band: ProfitBand::from_rate(avg_rate_per_mile),
                marker_radius: marker_radius(acc.load_count),
            }
        })
        .collect();

    points.sort_by(|a, b| b.load_count.cmp(&a.load_count));
    points
}
