use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::access::{evaluate_access, AccessState, AccountProfile, AccountRole, StaticSubscriptions};
use crate::config::Config;
use crate::economics::annotate;
use crate::fleet::{
    apply_filter, default_order, paginate, revenue_buckets, sort_loads, LoadFilter, LoadSortKey,
    Page, RevenueBucket, SortDirection,
};
use crate::geocode::{GeocodeCache, MemoryStore, NominatimGeocoder, SqliteStore};
use crate::model::{CalculatedLoad, Dataset, ViewerRole};
use crate::routes::{
    analyze_routes, destination_scatter, rank_routes, resolve_coordinates, DestinationScatter,
    RouteAnalysis, RouteFilter, RouteSortKey,
};
use crate::validate::{audit, DataQualityIssue};

#[derive(Clone)]
struct ApiState {
    config: Config,
    dataset: Arc<Dataset>,
    cache: Arc<GeocodeCache>,
    subscriptions: Arc<StaticSubscriptions>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize, Default)]
struct LoadsRequest {
    #[serde(default)]
    filter: LoadFilter,
    sort: Option<String>,
    direction: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RevenueRequest {
    #[serde(default)]
    filter: LoadFilter,
    role: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RoutesRequest {
    #[serde(default)]
    filter: RouteFilter,
    sort: Option<String>,
    #[serde(default = "default_true")]
    geocode: bool,
    top: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ScatterRequest {
    #[serde(default)]
    filter: RouteFilter,
}

#[derive(Debug, Clone, Deserialize)]
struct AccessRequest {
    account_id: String,
    role: Option<String>,
    signed_up_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct LoadsResponse {
    page: Page<CalculatedLoad>,
}

#[derive(Debug, Serialize)]
struct RevenueResponse {
    buckets: Vec<RevenueBucket>,
}

#[derive(Debug, Serialize)]
struct RoutesResponse {
    routes: Vec<RouteAnalysis>,
}

#[derive(Debug, Serialize)]
struct ScatterResponse {
    points: Vec<DestinationScatter>,
}

#[derive(Debug, Serialize)]
struct AuditResponse {
    issues: Vec<DataQualityIssue>,
}

#[derive(Debug, Serialize)]
struct AccessResponse {
    state: AccessState,
    allows: bool,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let dataset = load_dataset(&config);
    let cache = build_cache(&config);
    let subscriptions = Arc::new(StaticSubscriptions::new(
        config.access.subscribed_accounts.iter().cloned(),
    ));
    let state = ApiState {
        config,
        dataset: Arc::new(dataset),
        cache: Arc::new(cache),
        subscriptions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/loads", post(loads))
        .route("/v1/revenue", post(revenue))
        .route("/v1/routes", post(routes))
        .route("/v1/scatter", post(scatter))
        .route("/v1/audit", post(audit_handler))
        .route("/v1/access", post(access))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_dataset(config: &Config) -> Dataset {
    let path = config.resolved_data_path();
    if !path.exists() {
        warn!("dataset not found at {}, serving empty set", path.display());
        return Dataset::default();
    }
    match Dataset::from_path(&path) {
        Ok(dataset) => dataset,
        Err(err) => {
            warn!("failed loading dataset, serving empty set: {err:#}");
            Dataset::default()
        }
    }
}

pub fn build_cache(config: &Config) -> GeocodeCache {
    let geocoder = Arc::new(NominatimGeocoder::new(
        config.geocoder.endpoint.clone(),
        &config.geocoder.user_agent,
    ));
    let cache_path = config.resolved_cache_path();
    let cache = match SqliteStore::open(&cache_path) {
        Ok(store) => GeocodeCache::new(geocoder, Arc::new(store)),
        Err(err) => {
            warn!(
                "failed opening geocode cache at {}, falling back to memory: {err}",
                cache_path.display()
            );
            GeocodeCache::new(geocoder, Arc::new(MemoryStore::default()))
        }
    };
    cache.with_ttl(config.cache_ttl())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

fn annotated(state: &ApiState) -> Vec<CalculatedLoad> {
    let schedule = state
        .dataset
        .fee_schedule(state.config.engine.default_fee_percent);
    let plans = state.dataset.pay_plan_book();
    let mut loads = annotate(&state.dataset.loads, &schedule, &plans);
    default_order(&mut loads);
    loads
}

async fn loads(
    State(state): State<ApiState>,
    Json(request): Json<LoadsRequest>,
) -> ApiResult<LoadsResponse> {
    let sort_key = parse_opt::<LoadSortKey>(request.sort.as_deref())?.unwrap_or_default();
    let direction = parse_opt::<SortDirection>(request.direction.as_deref())?
        .unwrap_or_else(|| sort_key.default_direction());

    let all = annotated(&state);
    let mut filtered = apply_filter(&all, &request.filter);
    sort_loads(&mut filtered, sort_key, direction);
    let page = paginate(
        filtered,
        request.page.unwrap_or(1),
        request.page_size.unwrap_or(state.config.engine.page_size),
    );

    Ok(ok(LoadsResponse { page }))
}

async fn revenue(
    State(state): State<ApiState>,
    Json(request): Json<RevenueRequest>,
) -> ApiResult<RevenueResponse> {
    let role = parse_opt::<ViewerRole>(request.role.as_deref())?.unwrap_or(ViewerRole::Owner);
    let all = annotated(&state);
    let filtered = apply_filter(&all, &request.filter);
    let buckets = revenue_buckets(&filtered, role);
    Ok(ok(RevenueResponse { buckets }))
}

async fn routes(
    State(state): State<ApiState>,
    Json(request): Json<RoutesRequest>,
) -> ApiResult<RoutesResponse> {
    let sort_key = parse_opt::<RouteSortKey>(request.sort.as_deref())?.unwrap_or_default();

    let all = annotated(&state);
    let mut analyzed = analyze_routes(&all, &request.filter);
    if request.geocode {
        resolve_coordinates(&mut analyzed, &state.cache).await;
    }
    rank_routes(&mut analyzed, sort_key);
    if let Some(top) = request.top {
        analyzed.truncate(top);
    }

    Ok(ok(RoutesResponse { routes: analyzed }))
}

async fn scatter(
    State(state): State<ApiState>,
    Json(request): Json<ScatterRequest>,
) -> ApiResult<ScatterResponse> {
    let all = annotated(&state);
    let mut analyzed = analyze_routes(&all, &request.filter);
    resolve_coordinates(&mut analyzed, &state.cache).await;
    let points = destination_scatter(&analyzed);
    Ok(ok(ScatterResponse { points }))
}

async fn audit_handler(State(state): State<ApiState>) -> ApiResult<AuditResponse> {
    Ok(ok(AuditResponse {
        issues: audit(&state.dataset),
    }))
}

async fn access(
    State(state): State<ApiState>,
    Json(request): Json<AccessRequest>,
) -> ApiResult<AccessResponse> {
    let role = match request.role.as_deref() {
        Some("superuser") => AccountRole::Superuser,
        Some("member") | None => AccountRole::Member,
        Some(other) => return Err(ApiError::bad_request(format!("unknown role: {other}"))),
    };
    let profile = AccountProfile {
        account_id: request.account_id,
        role,
        signed_up_at: request.signed_up_at,
    };
    let verdict = evaluate_access(
        &profile,
        state.subscriptions.as_ref(),
        Utc::now(),
        state.config.access.trial_days,
    )
    .await;

    Ok(ok(AccessResponse {
        allows: verdict.allows(),
        state: verdict,
    }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn default_true() -> bool {
    true
}

fn parse_opt<T>(raw: Option<&str>) -> std::result::Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|s| s.parse::<T>())
        .transpose()
        .map_err(|error| ApiError::bad_request(error.to_string()))
}
