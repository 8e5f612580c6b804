use crate::reconcile::LabelMapping;
use crate::types::{BoundaryRecord, CombinedRecord, CombinedTable, IndicatorRecord};
use geo::MultiPolygon;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Boundary geometry with the survey label it answers to, if any.
#[derive(Debug, Clone)]
pub struct LabelledBoundary {
    pub name: String,
    pub label: Option<String>,
    pub geometry: Arc<MultiPolygon<f64>>,
}

/// BoundaryRecord ⋈ LabelMapping on boundary name (left join).
pub fn label_boundaries(boundaries: Vec<BoundaryRecord>, mapping: &LabelMapping) -> Vec<LabelledBoundary> {
    boundaries
        .into_iter()
        .map(|b| {
            let label = mapping.survey_label_for(&b.name).map(str::to_string);
            if label.is_none() {
                warn!("Boundary region '{}' has no survey label", b.name);
            }
            LabelledBoundary {
                name: b.name,
                label,
                geometry: Arc::new(b.geometry),
            }
        })
        .collect()
}

/// IndicatorRecord ⋈ LabelledBoundary on survey label (left join, many-to-one).
///
/// Rows whose label has no geometry are kept with `geometry: None`; they still
/// feed the trend and table views.
pub fn join_indicators(records: Vec<IndicatorRecord>, labelled: &[LabelledBoundary]) -> CombinedTable {
    let by_label: HashMap<&str, &Arc<MultiPolygon<f64>>> = labelled
        .iter()
        .filter_map(|b| b.label.as_deref().map(|l| (l, &b.geometry)))
        .collect();

    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut years = BTreeSet::new();

    let rows: Vec<CombinedRecord> = records
        .into_iter()
        .map(|r| {
            years.insert(r.survey_year);
            let geometry = by_label.get(r.region.as_str()).map(|g| Arc::clone(g));
            if geometry.is_none() {
                missing.insert(r.region.clone());
            }
            CombinedRecord {
                indicator: r.indicator,
                indicator_id: r.indicator_id,
                region: r.region,
                survey_year: r.survey_year,
                value: r.value,
                geometry,
            }
        })
        .collect();

    for region in &missing {
        warn!("No geometry for survey region '{}'; it will be missing from the map", region);
    }

    CombinedTable::new(rows, years)
}

pub fn build_combined_table(
    boundaries: Vec<BoundaryRecord>,
    records: Vec<IndicatorRecord>,
    mapping: &LabelMapping,
) -> CombinedTable {
    let labelled = label_boundaries(boundaries, mapping);
    let table = join_indicators(records, &labelled);
    info!(
        "Combined table: {} rows, {} with geometry, years {:?}",
        table.len(),
        table.rows.iter().filter(|r| r.has_geometry()).count(),
        table.source_years
    );
    table
}
