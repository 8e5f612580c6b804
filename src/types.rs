use geo::MultiPolygon;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One first-level administrative region from the boundary source.
#[derive(Debug, Clone)]
pub struct BoundaryRecord {
    pub name: String, // As spelled by GADM (NAME_1)
    pub geometry: MultiPolygon<f64>,
}

/// One (indicator, region, survey year) row from the DHS API.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRecord {
    pub indicator: String,
    pub indicator_id: Option<String>,
    pub region: String, // As spelled by DHS (CharacteristicLabel)
    pub survey_year: i32,
    pub value: f64,
    pub survey_id: Option<String>,
    pub is_preferred: Option<bool>,
    // Columns not otherwise interpreted
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Indicator row with the geometry of its region attached, if the label was mapped.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedRecord {
    pub indicator: String,
    pub indicator_id: Option<String>,
    pub region: String,
    pub survey_year: i32,
    pub value: f64,
    #[serde(skip)]
    pub geometry: Option<Arc<MultiPolygon<f64>>>,
}

impl CombinedRecord {
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}

/// The analysis-ready table. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CombinedTable {
    pub rows: Vec<CombinedRecord>,
    // Years present in the raw indicator response
    pub source_years: BTreeSet<i32>,
}

impl CombinedTable {
    pub fn new(rows: Vec<CombinedRecord>, source_years: BTreeSet<i32>) -> Self {
        Self { rows, source_years }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
