use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use dispatch_lens::access::{
    evaluate_access, AccountProfile, AccountRole, StaticSubscriptions,
};
use dispatch_lens::config::{Config, ConfigOverrides};
use dispatch_lens::economics::annotate;
use dispatch_lens::fleet::{
    apply_filter, default_order, paginate, revenue_buckets, sort_loads, LoadFilter, LoadSortKey,
    Page, RevenueBucket, SortDirection,
};
use dispatch_lens::model::{CalculatedLoad, Dataset, ViewerRole};
use dispatch_lens::output::csv::{loads_to_csv, routes_to_csv};
use dispatch_lens::output::json::render_json;
use dispatch_lens::output::table::{
    render_audit_table, render_loads_table, render_revenue_table, render_routes_table,
    render_scatter_table,
};
use dispatch_lens::routes::{
    analyze_routes, destination_scatter, rank_routes, resolve_coordinates, RouteFilter,
    RouteSortKey,
};
use dispatch_lens::server::{build_cache, run_server};
use dispatch_lens::validate::audit;
use tracing::warn;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "dispatch-lens",
    about = "Load economics and route analytics for trucking fleets"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    data: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(flatten)]
    filters: FilterArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct FilterArgs {
    /// Substring match over broker, origin and destination.
    #[arg(long)]
    search: Option<String>,
    /// Exact driver id.
    #[arg(long)]
    driver: Option<String>,
    /// Inclusive start of the drop-date window (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Inclusive end of the drop-date window (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl From<FilterArgs> for LoadFilter {
    fn from(value: FilterArgs) -> Self {
        Self {
            search: value.search,
            driver_id: value.driver,
            date_from: value.from,
            date_to: value.to,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// One page of economics-annotated loads.
    Loads {
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        direction: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long = "page-size")]
        page_size: Option<usize>,
    },
    /// Per-driver or per-dispatcher revenue buckets.
    Revenue {
        #[arg(long, default_value = "owner")]
        by: String,
    },
    /// Ranked route statistics.
    Routes {
        #[arg(long)]
        pickup: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long = "no-geocode")]
        no_geocode: bool,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Destination-level scatter aggregation (geocoded).
    Scatter {
        #[arg(long)]
        pickup: Option<String>,
        #[arg(long)]
        destination: Option<String>,
    },
    /// Data-quality findings over the dataset.
    Audit,
    /// Classify feature access for an account.
    Access {
        #[arg(long)]
        account: String,
        #[arg(long)]
        superuser: bool,
        #[arg(long = "signed-up")]
        signed_up: String,
        #[arg(long)]
        subscribed: bool,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        data_path: cli.data.as_ref().map(|p| p.display().to_string()),
        geocoder_endpoint: None,
        page_size: None,
    });

    match &cli.command {
        Commands::Config { init, show } => {
            if *init {
                Config::write_template(&config_path)?;
                println!("Wrote config template to {}", config_path.display());
            }
            if *show || !*init {
                println!("{}", render_json(&config)?);
            }
            return Ok(());
        }
        Commands::Serve { host, port } => {
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            return run_server(config, addr).await;
        }
        Commands::Access {
            account,
            superuser,
            signed_up,
            subscribed,
        } => {
            let profile = AccountProfile {
                account_id: account.clone(),
                role: if *superuser {
                    AccountRole::Superuser
                } else {
                    AccountRole::Member
                },
                signed_up_at: parse_timestamp(signed_up)?,
            };
            let mut active: Vec<String> = config.access.subscribed_accounts.clone();
            if *subscribed {
                active.push(account.clone());
            }
            let lookup = StaticSubscriptions::new(active);
            let verdict =
                evaluate_access(&profile, &lookup, Utc::now(), config.access.trial_days).await;
            match cli.output {
                OutputFormat::Json | OutputFormat::Csv => println!(
                    "{}",
                    render_json(&serde_json::json!({
                        "account": account,
                        "state": verdict,
                        "allows": verdict.allows(),
                    }))?
                ),
                OutputFormat::Table => println!(
                    "access for {account}: {verdict} (allowed: {})",
                    verdict.allows()
                ),
            }
            return Ok(());
        }
        _ => {}
    }

    let dataset = Dataset::from_path(&config.resolved_data_path())?;
    let schedule = dataset.fee_schedule(config.engine.default_fee_percent);
    let plans = dataset.pay_plan_book();
    let mut all = annotate(&dataset.loads, &schedule, &plans);
    default_order(&mut all);
    let filter: LoadFilter = cli.filters.clone().into();
    let filtered = apply_filter(&all, &filter);

    match &cli.command {
        Commands::Loads {
            sort,
            direction,
            page,
            page_size,
        } => {
            let sort_key: LoadSortKey = match sort.as_deref() {
                Some(raw) => raw.parse()?,
                None => LoadSortKey::default(),
            };
            let dir: SortDirection = match direction.as_deref() {
                Some(raw) => raw.parse()?,
                None => sort_key.default_direction(),
            };
            let mut sorted = filtered;
            sort_loads(&mut sorted, sort_key, dir);
            let page = paginate(
                sorted,
                *page,
                page_size.unwrap_or(config.engine.page_size),
            );
            print_loads(&page, cli.output)?;
        }
        Commands::Revenue { by } => {
            let role: ViewerRole = by.parse()?;
            let buckets = revenue_buckets(&filtered, role);
            print_revenue(&buckets, cli.output)?;
        }
        Commands::Routes {
            pickup,
            destination,
            sort,
            no_geocode,
            top,
        } => {
            let route_filter = RouteFilter {
                pickup: pickup.clone(),
                destination: destination.clone(),
            };
            let sort_key: RouteSortKey = match sort.as_deref() {
                Some(raw) => raw.parse()?,
                None => RouteSortKey::default(),
            };
            let mut routes = analyze_routes(&filtered, &route_filter);
            if !*no_geocode {
                let cache = build_cache(&config);
                resolve_coordinates(&mut routes, &cache).await;
            }
            rank_routes(&mut routes, sort_key);
            if let Some(top) = top {
                routes.truncate(*top);
            }
            match cli.output {
                OutputFormat::Table => println!("{}", render_routes_table(&routes)),
                OutputFormat::Json => println!("{}", render_json(&routes)?),
                OutputFormat::Csv => println!("{}", routes_to_csv(&routes)?),
            }
        }
        Commands::Scatter {
            pickup,
            destination,
        } => {
            let route_filter = RouteFilter {
                pickup: pickup.clone(),
                destination: destination.clone(),
            };
            let mut routes = analyze_routes(&filtered, &route_filter);
            let cache = build_cache(&config);
            resolve_coordinates(&mut routes, &cache).await;
            let points = destination_scatter(&routes);
            match cli.output {
                OutputFormat::Table => println!("{}", render_scatter_table(&points)),
                OutputFormat::Json => println!("{}", render_json(&points)?),
                OutputFormat::Csv => {
                    warn!("CSV output for scatter not implemented, using JSON");
                    println!("{}", render_json(&points)?);
                }
            }
        }
        Commands::Audit => {
            let issues = audit(&dataset);
            match cli.output {
                OutputFormat::Table => println!("{}", render_audit_table(&issues)),
                OutputFormat::Json | OutputFormat::Csv => println!("{}", render_json(&issues)?),
            }
        }
        Commands::Access { .. } | Commands::Serve { .. } | Commands::Config { .. } => {
            unreachable!("handled before dataset load")
        }
    }

    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let date: NaiveDate = raw
        .parse()
        .with_context(|| format!("expected RFC3339 timestamp or YYYY-MM-DD date: {raw}"))?;
    Ok(date.and_hms_opt(0, 0, 0).expect("valid midnight").and_utc())
}

fn print_loads(page: &Page<CalculatedLoad>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_loads_table(page)),
        OutputFormat::Json => println!("{}", render_json(page)?),
        OutputFormat::Csv => println!("{}", loads_to_csv(&page.items)?),
    }
    Ok(())
}

fn print_revenue(buckets: &[RevenueBucket], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_revenue_table(buckets)),
        OutputFormat::Json => println!("{}", render_json(buckets)?),
        OutputFormat::Csv => {
            warn!("CSV output for revenue not implemented, using JSON");
            println!("{}", render_json(buckets)?);
        }
    }
    Ok(())
}
