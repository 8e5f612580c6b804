use crate::config::AppConfig;
use crate::error::Result;
use crate::fetch;
use crate::join;
use crate::normalize::RawTable;
use crate::reconcile::LabelMapping;
use crate::types::CombinedTable;
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Fetches both sources, one after the other, and joins them.
///
/// Any fetch or parse failure is returned as-is; there is no retry and no
/// partial table.
pub async fn load_data(config: &AppConfig) -> Result<CombinedTable> {
    info!("Loading data...");
    let client = reqwest::Client::new();

    // 1. Boundaries
    let boundaries = fetch::fetch_boundaries(&client, &config.sources.boundary_archive).await?;
    info!("Loaded {} boundary regions", boundaries.len());

    // 2. Indicator rows
    let rows = fetch::fetch_indicator_rows(&client, &config.sources).await?;
    let raw = RawTable::from_rows(rows);
    info!("Loaded {} indicator rows ({} columns)", raw.len(), raw.columns().len());
    let records = raw.into_records()?;

    // 3. Reconcile and join
    let mapping = LabelMapping::builtin();
    Ok(join::build_combined_table(boundaries, records, &mapping))
}

/// Writes the combined table without geometry.
pub fn write_csv<W: Write>(table: &CombinedTable, writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["indicator", "indicator_id", "region", "survey_year", "value", "has_geometry"])?;

    for row in table.table_view() {
        let year = row.survey_year.to_string();
        let value = row.value.to_string();
        wtr.write_record([
            row.indicator.as_str(),
            row.indicator_id.as_deref().unwrap_or(""),
            row.region.as_str(),
            year.as_str(),
            value.as_str(),
            if row.has_geometry() { "true" } else { "false" },
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_csv(table: &CombinedTable, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;
    write_csv(table, file)?;
    info!("Wrote {} rows to {:?}", table.len(), path);
    Ok(())
}
