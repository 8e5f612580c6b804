//! Read-only derivations of the combined table.
//!
//! Every call builds a fresh result from the shared table; nothing here keeps
//! state between requests. An unknown indicator simply yields empty results.

use crate::types::{CombinedRecord, CombinedTable};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IndicatorGroups {
    pub households: Vec<String>,
    pub populations: Vec<String>,
}

/// Rows of one region for the trend chart, ordered by year.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    pub region: String,
    pub points: Vec<(i32, f64)>,
}

/// Population-scoped labels win over household-scoped ones when both words appear
/// ("population living in households ..."). A label is listed under one switch
/// only, never both.
pub fn partition_indicators(options: &[String]) -> IndicatorGroups {
    let mut groups = IndicatorGroups::default();
    for option in options {
        let lower = option.to_lowercase();
        if lower.contains("population") {
            groups.populations.push(option.clone());
        } else if lower.contains("household") {
            groups.households.push(option.clone());
        }
    }
    groups
}

impl CombinedTable {
    /// Distinct indicator labels, sorted descending.
    pub fn indicator_options(&self) -> Vec<String> {
        let mut options: Vec<String> = self
            .rows
            .iter()
            .map(|r| r.indicator.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        options.sort_by(|a, b| b.cmp(a));
        options
    }

    pub fn indicator_groups(&self) -> IndicatorGroups {
        partition_indicators(&self.indicator_options())
    }

    fn rows_for(&self, indicator: &str) -> Vec<&CombinedRecord> {
        self.rows.iter().filter(|r| r.indicator == indicator).collect()
    }

    pub fn latest_year(&self, indicator: &str) -> Option<i32> {
        self.rows
            .iter()
            .filter(|r| r.indicator == indicator)
            .map(|r| r.survey_year)
            .max()
    }

    /// Rows of one indicator in one survey year, first occurrence per region.
    fn rows_in_year(&self, indicator: &str, year: i32) -> Vec<&CombinedRecord> {
        let mut seen = HashSet::new();
        self.rows_for(indicator)
            .into_iter()
            .filter(|r| r.survey_year == year)
            .filter(|&r| seen.insert(r.region.as_str()))
            .collect()
    }

    /// Choropleth rows: the table's most recent survey year, geometry required,
    /// one per region. Empty when the indicator was not measured that year.
    pub fn map_view(&self, indicator: &str) -> Vec<&CombinedRecord> {
        let Some(&year) = self.source_years.last() else {
            return Vec::new();
        };
        self.rows_in_year(indicator, year)
            .into_iter()
            .filter(|r| r.has_geometry())
            .collect()
    }

    /// Bar chart rows: the indicator's own latest year, highest value first.
    /// Geometry not required.
    pub fn bar_view(&self, indicator: &str) -> Vec<&CombinedRecord> {
        let Some(year) = self.latest_year(indicator) else {
            return Vec::new();
        };
        let mut rows = self.rows_in_year(indicator, year);
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));
        rows
    }

    /// All years of one indicator, ordered by (year, region).
    pub fn trend_view(&self, indicator: &str) -> Vec<&CombinedRecord> {
        let mut rows = self.rows_for(indicator);
        rows.sort_by(|a, b| {
            a.survey_year
                .cmp(&b.survey_year)
                .then_with(|| a.region.cmp(&b.region))
        });
        rows
    }

    pub fn trend_series(&self, indicator: &str) -> Vec<TrendSeries> {
        let mut by_region: BTreeMap<&str, Vec<(i32, f64)>> = BTreeMap::new();
        for row in self.trend_view(indicator) {
            by_region
                .entry(row.region.as_str())
                .or_default()
                .push((row.survey_year, row.value));
        }
        by_region
            .into_iter()
            .map(|(region, points)| TrendSeries { region: region.to_string(), points })
            .collect()
    }

    /// Everything, unfiltered.
    pub fn table_view(&self) -> &[CombinedRecord] {
        &self.rows
    }
}
