use anyhow::Result;

use crate::model::CalculatedLoad;
use crate::routes::RouteAnalysis;

pub fn loads_to_csv(loads: &[CalculatedLoad]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "drop_date",
        "broker",
        "origin",
        "destination",
        "dispatcher",
        "driver",
        "miles",
        "gross",
        "gas",
        "dispatch_fee",
        "driver_pay",
        "net_profit",
        "status",
    ])?;
    for calculated in loads {
        let load = &calculated.load;
        let economics = &calculated.economics;
        writer.write_record([
            load.id.clone(),
            load.drop_date.to_rfc3339(),
            load.broker.clone(),
            load.origin.clone(),
            load.destination.clone(),
            load.dispatcher.clone(),
            calculated
                .driver_name
                .clone()
                .or_else(|| load.driver_id.clone())
                .unwrap_or_default(),
            format!("{:.1}", load.miles),
            format!("{:.2}", load.gross_amount),
            format!("{:.2}", load.gas_amount),
            format!("{:.2}", economics.dispatch_fee),
            format!("{:.2}", economics.driver_pay),
            format!("{:.2}", economics.net_profit),
            load.status.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn routes_to_csv(routes: &[RouteAnalysis]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "route",
        "load_count",
        "total_gross",
        "avg_gross",
        "total_miles",
        "rate_per_mile",
        "band",
        "avg_net_profit",
        "origin_lat",
        "origin_lng",
        "destination_lat",
        "destination_lng",
    ])?;
    for route in routes {
        let (origin_lat, origin_lng) = route
            .origin_coords
            .map(|c| (format!("{:.5}", c.lat), format!("{:.5}", c.lng)))
            .unwrap_or_default();
        let (dest_lat, dest_lng) = route
            .destination_coords
            .map(|c| (format!("{:.5}", c.lat), format!("{:.5}", c.lng)))
            .unwrap_or_default();
        writer.write_record([
            format!("{} -> {}", route.origin, route.destination),
            route.load_count.to_string(),
            format!("{:.2}", route.total_gross),
            format!("{:.2}", route.avg_gross),
            format!("{:.1}", route.total_miles),
            format!("{:.4}", route.rate_per_mile),
            route.profit_band().label().to_string(),
            format!("{:.2}", route.avg_net_profit),
            origin_lat,
            origin_lng,
            dest_lat,
            dest_lng,
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
