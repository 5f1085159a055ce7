use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::fleet::{Page, RevenueBucket};
use crate::model::CalculatedLoad;
use crate::routes::{DestinationScatter, ProfitBand, RouteAnalysis};
use crate::validate::DataQualityIssue;

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_loads_table(page: &Page<CalculatedLoad>) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "ID", "Drop", "Broker", "Route", "Dispatcher", "Driver", "Miles", "Gross", "Fee", "Pay",
        "Net", "Status",
    ]);

    for calculated in &page.items {
        let load = &calculated.load;
        let economics = &calculated.economics;
        let driver = calculated
            .driver_name
            .as_deref()
            .or(load.driver_id.as_deref())
            .unwrap_or("-");
        table.add_row(vec![
            load.id.clone(),
            load.drop_date.format("%Y-%m-%d").to_string(),
            load.broker.clone(),
            format!("{} \u{2192} {}", load.origin.trim(), load.destination.trim()),
            load.dispatcher.clone(),
            driver.to_string(),
            format!("{:.0}", load.miles),
            format!("{:.2}", load.gross_amount),
            format!("{:.2}", economics.dispatch_fee),
            format!("{:.2}", economics.driver_pay),
            format!("{:.2}", economics.net_profit),
            load.status.to_string(),
        ]);
    }

    format!(
        "{}\npage {}/{} ({} loads)",
        table,
        page.page,
        page.page_count.max(1),
        page.total
    )
}

pub fn render_revenue_table(buckets: &[RevenueBucket]) -> String {
    let mut table = base_table();
    table.set_header(vec!["Name", "Loads", "Gross"]);
    for bucket in buckets {
        table.add_row(vec![
            bucket.name.clone(),
            bucket.load_count.to_string(),
            format!("{:.2}", bucket.gross),
        ]);
    }
    table.to_string()
}

fn band_cell(band: ProfitBand, rate_per_mile: f64) -> Cell {
    let color = match band {
        ProfitBand::VeryProfitable => Color::Green,
        ProfitBand::Profitable => Color::DarkGreen,
        ProfitBand::Moderate => Color::Yellow,
        ProfitBand::Low => Color::Red,
    };
    Cell::new(format!("{:.2} ({})", rate_per_mile, band.label())).fg(color)
}

pub fn render_routes_table(routes: &[RouteAnalysis]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Rank",
        "Route",
        "Loads",
        "Avg Gross",
        "Total Gross",
        "Miles",
        "$/mi",
        "Avg Net",
        "Best Load",
        "Coords",
    ]);

    for (idx, route) in routes.iter().enumerate() {
        let coords = match (route.origin_coords, route.destination_coords) {
            (Some(_), Some(_)) => "both",
            (Some(_), None) => "origin",
            (None, Some(_)) => "dest",
            (None, None) => "-",
        };
        table.add_row(Row::from(vec![
            Cell::new((idx + 1).to_string()),
            Cell::new(format!("{} \u{2192} {}", route.origin, route.destination)),
            Cell::new(route.load_count.to_string()),
            Cell::new(format!("{:.2}", route.avg_gross)),
            Cell::new(format!("{:.2}", route.total_gross)),
            Cell::new(format!("{:.0}", route.total_miles)),
            band_cell(route.profit_band(), route.rate_per_mile),
            Cell::new(format!("{:.2}", route.avg_net_profit)),
            Cell::new(format!(
                "{} ({:.2})",
                route.best_load.load.id, route.best_load.load.gross_amount
            )),
            Cell::new(coords),
        ]));
    }
    table.to_string()
}

pub fn render_scatter_table(points: &[DestinationScatter]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Destination",
        "Lat",
        "Lng",
        "Loads",
        "Gross",
        "Net",
        "$/mi",
        "Radius",
    ]);
    for point in points {
        table.add_row(Row::from(vec![
            Cell::new(point.destination.clone()),
            Cell::new(format!("{:.4}", point.coords.lat)),
            Cell::new(format!("{:.4}", point.coords.lng)),
            Cell::new(point.load_count.to_string()),
            Cell::new(format!("{:.2}", point.total_gross)),
            Cell::new(format!("{:.2}", point.total_net_profit)),
            band_cell(point.band, point.avg_rate_per_mile),
            Cell::new(format!("{:.1}", point.marker_radius)),
        ]));
    }
    table.to_string()
}

pub fn render_audit_table(issues: &[DataQualityIssue]) -> String {
    let mut table = base_table();
    table.set_header(vec!["Issue", "Detail"]);
    for issue in issues {
        let (kind, detail) = match issue {
            DataQualityIssue::DuplicateDispatcherName { names } => {
                ("duplicate dispatcher", names.join(" / "))
            }
            DataQualityIssue::PercentOutOfRange { subject, percent } => {
                ("percent out of range", format!("{subject}: {percent}"))
            }
            DataQualityIssue::UnknownDriver { load_id, driver_id } => (
                "unknown driver",
                format!("load {load_id} references {driver_id}"),
            ),
            DataQualityIssue::NonPositiveMiles { load_id, miles } => {
                ("non-positive miles", format!("load {load_id}: {miles}"))
            }
        };
        table.add_row(vec![kind.to_string(), detail]);
    }
    table.to_string()
}
