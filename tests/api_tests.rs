//! Integration tests for the dashboard HTTP API, run against an in-memory
//! combined table (no network).

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dhs_ethiopia_map::render::MapStyle;
use dhs_ethiopia_map::types::{CombinedRecord, CombinedTable};
use dhs_ethiopia_map::{build_router, AppState};
use geo::{polygon, MultiPolygon};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

const ELEC: &str = "Households with electricity";

fn square(x: f64, y: f64) -> Option<Arc<MultiPolygon<f64>>> {
    Some(Arc::new(MultiPolygon::new(vec![polygon![
        (x: x, y: y),
        (x: x + 2.0, y: y),
        (x: x + 2.0, y: y + 2.0),
        (x: x, y: y + 2.0),
        (x: x, y: y),
    ]])))
}

fn record(indicator: &str, region: &str, year: i32, value: f64, geometry: Option<Arc<MultiPolygon<f64>>>) -> CombinedRecord {
    CombinedRecord {
        indicator: indicator.to_string(),
        indicator_id: None,
        region: region.to_string(),
        survey_year: year,
        value,
        geometry,
    }
}

/// Test helper: Tigray and Afar mapped, SNNPR unmapped
fn setup_app() -> axum::Router {
    let tigray = square(37.0, 13.0);
    let afar = square(40.0, 11.0);
    let rows = vec![
        record(ELEC, "Tigray", 2016, 41.2, tigray.clone()),
        record(ELEC, "Afar", 2019, 22.5, afar.clone()),
        record(ELEC, "Tigray", 2019, 47.0, tigray),
        record(ELEC, "SNNPR", 2019, 30.0, None),
        record("Population with electricity", "Afar", 2019, 20.1, afar),
    ];
    let years: BTreeSet<i32> = rows.iter().map(|r| r.survey_year).collect();
    let state = AppState::new(CombinedTable::new(rows, years), MapStyle::default());
    build_router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

async fn get_json(uri: &str) -> (StatusCode, Value) {
    let response = setup_app().oneshot(get(uri)).await.unwrap();
    let status = response.status();
    let bytes = body_bytes(response.into_body()).await;
    (status, serde_json::from_slice(&bytes).expect("Should parse JSON"))
}

fn encoded(indicator: &str) -> String {
    indicator.replace(' ', "%20")
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_index_and_script_served() {
    let response = setup_app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(html.contains("Demographic Health Surveys of Ethiopia"));

    let response = setup_app().oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/javascript");
}

#[tokio::test]
async fn test_indicator_groups() {
    let (status, body) = get_json("/api/indicators").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["households"], serde_json::json!([ELEC]));
    assert_eq!(body["populations"], serde_json::json!(["Population with electricity"]));
}

#[tokio::test]
async fn test_map_view_excludes_unmapped_region() {
    let (status, body) = get_json(&format!("/api/map?indicator={}", encoded(ELEC))).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    let regions: Vec<&str> = rows.iter().map(|r| r["region"].as_str().unwrap()).collect();
    assert_eq!(regions, vec!["Afar", "Tigray"]);
    assert!(rows.iter().all(|r| r["survey_year"] == 2019));
}

#[tokio::test]
async fn test_bar_view_sorted_and_includes_unmapped() {
    let (_, body) = get_json(&format!("/api/bar?indicator={}", encoded(ELEC))).await;
    let values: Vec<f64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["value"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![47.0, 30.0, 22.5]);
}

#[tokio::test]
async fn test_trend_series() {
    let (_, body) = get_json(&format!("/api/trend?indicator={}", encoded(ELEC))).await;
    let series = body.as_array().unwrap();
    assert_eq!(series.len(), 3);
    let tigray = series.iter().find(|s| s["region"] == "Tigray").unwrap();
    assert_eq!(tigray["points"], serde_json::json!([[2016, 41.2], [2019, 47.0]]));
}

#[tokio::test]
async fn test_table_view_is_unfiltered() {
    let (_, body) = get_json("/api/table").await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    let snnpr = rows.iter().find(|r| r["region"] == "SNNPR").unwrap();
    assert_eq!(snnpr["has_geometry"], false);
    assert!(snnpr.get("geometry").is_none());
}

#[tokio::test]
async fn test_unknown_indicator_gives_empty_results() {
    let (status, body) = get_json("/api/map?indicator=Nope").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    let response = setup_app().oneshot(get("/chart/bar.svg?indicator=Nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let svg = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(svg.contains("No data"));
}

#[tokio::test]
async fn test_missing_indicator_is_bad_request() {
    let response = setup_app().oneshot(get("/api/map")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chart_content_types() {
    let app = setup_app();
    let response = app
        .clone()
        .oneshot(get(&format!("/chart/map.png?indicator={}", encoded(ELEC))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert!(body_bytes(response.into_body()).await.starts_with(b"\x89PNG"));

    let response = app
        .oneshot(get(&format!("/chart/trend.svg?indicator={}", encoded(ELEC))))
        .await
        .unwrap();
    assert_eq!(response.headers()["content-type"], "image/svg+xml");
}

#[tokio::test]
async fn test_region_lookup() {
    let (_, body) = get_json(&format!("/api/region?lat=12&lon=41&indicator={}", encoded(ELEC))).await;
    assert_eq!(body["region"], "Afar");
    assert_eq!(body["survey_year"], 2019);
    assert_eq!(body["value"], 22.5);

    let (_, body) = get_json("/api/region?lat=14&lon=38").await;
    assert_eq!(body["region"], "Tigray");
    assert!(body["value"].is_null());

    let (_, body) = get_json("/api/region?lat=0&lon=0").await;
    assert!(body.is_null());
}
