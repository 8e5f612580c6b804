use crate::charts;
use crate::config::AppConfig;
use crate::render::{self, MapStyle};
use crate::types::{CombinedRecord, CombinedTable};
use crate::views::{IndicatorGroups, TrendSeries};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const INDEX_HTML: &str = include_str!("ui/index.html");
const APP_JS: &str = include_str!("ui/app.js");

// Wrapper for RTree indexing
struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point lookup over the distinct mapped regions of the table.
pub struct RegionIndex {
    regions: Vec<(String, Arc<MultiPolygon<f64>>)>,
    tree: RTree<AreaIndex>,
}

impl RegionIndex {
    pub fn build(table: &CombinedTable) -> Self {
        let mut seen = HashSet::new();
        let regions: Vec<(String, Arc<MultiPolygon<f64>>)> = table
            .rows
            .iter()
            .filter_map(|r| r.geometry.as_ref().map(|g| (r, g)))
            .filter(|(r, _)| seen.insert(r.region.clone()))
            .map(|(r, g)| (r.region.clone(), Arc::clone(g)))
            .collect();

        let items: Vec<AreaIndex> = regions
            .iter()
            .enumerate()
            .filter_map(|(i, (_, geometry))| {
                let rect = geometry.bounding_rect()?;
                Some(AreaIndex {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            regions,
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Survey label of the region containing (lon, lat).
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&str> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| self.regions.get(candidate.index))
            .find(|(_, geometry)| geometry.contains(&point))
            .map(|(label, _)| label.as_str())
    }
}

/// Immutable context shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<CombinedTable>,
    pub regions: Arc<RegionIndex>,
    pub style: Arc<MapStyle>,
}

impl AppState {
    pub fn new(table: CombinedTable, style: MapStyle) -> Self {
        let regions = RegionIndex::build(&table);
        info!("Spatial index built for {} regions", regions.len());
        Self {
            table: Arc::new(table),
            regions: Arc::new(regions),
            style: Arc::new(style),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IndicatorQuery {
    pub indicator: String,
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub lat: f64,
    pub lon: f64,
    pub indicator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewRow {
    pub region: String,
    pub survey_year: i32,
    pub value: f64,
}

impl From<&CombinedRecord> for ViewRow {
    fn from(r: &CombinedRecord) -> Self {
        Self {
            region: r.region.clone(),
            survey_year: r.survey_year,
            value: r.value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TableRow {
    #[serde(flatten)]
    pub record: CombinedRecord,
    pub has_geometry: bool,
}

#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub region: String,
    pub survey_year: Option<i32>,
    pub value: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

pub enum ChartError {
    Render(String),
}

impl IntoResponse for ChartError {
    fn into_response(self) -> Response {
        match self {
            ChartError::Render(msg) => {
                error!("Chart rendering failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/static/app.js", get(serve_app_js))
        .route("/health", get(health_check))
        .route("/api/indicators", get(indicators_handler))
        .route("/api/map", get(map_handler))
        .route("/api/bar", get(bar_handler))
        .route("/api/trend", get(trend_handler))
        .route("/api/table", get(table_handler))
        .route("/api/region", get(region_handler))
        .route("/chart/map.png", get(map_png_handler))
        .route("/chart/bar.svg", get(bar_svg_handler))
        .route("/chart/trend.svg", get(trend_svg_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: &AppConfig, state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn serve_app_js() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        APP_JS,
    )
        .into_response()
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn indicators_handler(State(state): State<AppState>) -> Json<IndicatorGroups> {
    Json(state.table.indicator_groups())
}

async fn map_handler(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Json<Vec<ViewRow>> {
    Json(state.table.map_view(&params.indicator).into_iter().map(ViewRow::from).collect())
}

async fn bar_handler(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Json<Vec<ViewRow>> {
    Json(state.table.bar_view(&params.indicator).into_iter().map(ViewRow::from).collect())
}

async fn trend_handler(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Json<Vec<TrendSeries>> {
    Json(state.table.trend_series(&params.indicator))
}

async fn table_handler(State(state): State<AppState>) -> Json<Vec<TableRow>> {
    Json(
        state
            .table
            .table_view()
            .iter()
            .map(|r| TableRow {
                has_geometry: r.has_geometry(),
                record: r.clone(),
            })
            .collect(),
    )
}

async fn region_handler(
    State(state): State<AppState>,
    Query(params): Query<RegionQuery>,
) -> Json<Option<RegionResponse>> {
    let Some(region) = state.regions.locate(params.lon, params.lat) else {
        return Json(None);
    };

    let latest = params.indicator.as_deref().and_then(|indicator| {
        state
            .table
            .map_view(indicator)
            .into_iter()
            .find(|r| r.region == region)
            .map(|r| (r.survey_year, r.value))
    });

    Json(Some(RegionResponse {
        region: region.to_string(),
        survey_year: latest.map(|(year, _)| year),
        value: latest.map(|(_, value)| value),
    }))
}

async fn map_png_handler(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Result<Response, ChartError> {
    // Rasterisation is CPU bound; keep it off the async workers
    let png = tokio::task::spawn_blocking(move || {
        let rows = state.table.map_view(&params.indicator);
        render::render_choropleth(&rows, &state.style)
    })
    .await
    .map_err(|e| ChartError::Render(e.to_string()))?
    .map_err(|e| ChartError::Render(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn bar_svg_handler(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Response {
    let svg = charts::bar_chart_svg(&state.table.bar_view(&params.indicator), &state.style);
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}

async fn trend_svg_handler(
    State(state): State<AppState>,
    Query(params): Query<IndicatorQuery>,
) -> Response {
    let svg = charts::trend_chart_svg(&state.table.trend_series(&params.indicator));
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}
