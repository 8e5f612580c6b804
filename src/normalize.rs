//! Turns raw DHS row objects into a column table and then typed records.

use crate::error::{Error, Result};
use crate::types::IndicatorRecord;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub type Row = Map<String, Value>;

pub const COL_INDICATOR: &str = "Indicator";
pub const COL_INDICATOR_ID: &str = "IndicatorId";
pub const COL_REGION: &str = "CharacteristicLabel";
pub const COL_YEAR: &str = "SurveyYear";
pub const COL_VALUE: &str = "Value";
pub const COL_SURVEY_ID: &str = "SurveyId";
pub const COL_PREFERRED: &str = "IsPreferred";

/// Row-oriented table whose columns are the union of the row objects' keys.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<String>,
    col_indices: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut table = RawTable::default();

        // Columns in first-seen order
        for row in &rows {
            for key in row.keys() {
                if !table.col_indices.contains_key(key) {
                    table.col_indices.insert(key.clone(), table.columns.len());
                    table.columns.push(key.clone());
                }
            }
        }

        for mut row in rows {
            let cells = table
                .columns
                .iter()
                .map(|c| row.remove(c).unwrap_or(Value::Null))
                .collect();
            table.rows.push(cells);
        }

        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All cells of one column, or None if no row had that key.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = *self.col_indices.get(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn into_records(self) -> Result<Vec<IndicatorRecord>> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }

        let required = |name: &str| {
            self.col_indices
                .get(name)
                .copied()
                .ok_or_else(|| Error::Parse(format!("indicator data has no '{}' column", name)))
        };
        let indicator_idx = required(COL_INDICATOR)?;
        let region_idx = required(COL_REGION)?;
        let year_idx = required(COL_YEAR)?;
        let value_idx = required(COL_VALUE)?;

        let optional = |name: &str| self.col_indices.get(name).copied();
        let indicator_id_idx = optional(COL_INDICATOR_ID);
        let survey_id_idx = optional(COL_SURVEY_ID);
        let preferred_idx = optional(COL_PREFERRED);

        let interpreted = [
            Some(indicator_idx),
            Some(region_idx),
            Some(year_idx),
            Some(value_idx),
            indicator_id_idx,
            survey_id_idx,
            preferred_idx,
        ];

        let mut records = Vec::with_capacity(self.rows.len());

        for (row_idx, row) in self.rows.iter().enumerate() {
            let text = |idx: usize, name: &str| -> Result<String> {
                match &row[idx] {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Error::Parse(format!(
                        "row {}: '{}' is not a string: {}",
                        row_idx, name, other
                    ))),
                }
            };

            let year = as_f64(&row[year_idx])
                .filter(|y| y.fract() == 0.0)
                .ok_or_else(|| {
                    Error::Parse(format!("row {}: bad '{}': {}", row_idx, COL_YEAR, row[year_idx]))
                })? as i32;
            let value = as_f64(&row[value_idx]).ok_or_else(|| {
                Error::Parse(format!("row {}: bad '{}': {}", row_idx, COL_VALUE, row[value_idx]))
            })?;

            let extra = self
                .columns
                .iter()
                .enumerate()
                .filter(|(i, _)| !interpreted.contains(&Some(*i)))
                .map(|(i, c)| (c.clone(), row[i].clone()))
                .collect();

            records.push(IndicatorRecord {
                indicator: text(indicator_idx, COL_INDICATOR)?,
                indicator_id: indicator_id_idx.and_then(|i| row[i].as_str().map(str::to_string)),
                region: text(region_idx, COL_REGION)?,
                survey_year: year,
                value,
                survey_id: survey_id_idx.and_then(|i| row[i].as_str().map(str::to_string)),
                is_preferred: preferred_idx.and_then(|i| as_f64(&row[i])).map(|p| p != 0.0),
                extra,
            });
        }

        Ok(records)
    }
}

/// JSON numbers, or strings holding a number (DHS returns both).
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
