//! Remote fetchers for the DHS indicator API and the GADM boundary archive.

use crate::config::{BOUNDARY_NAME_PROPERTY, BREAKDOWN, COUNTRY_CODE, INDICATOR_CODES, SourcesConfig};
use crate::error::{Error, Result};
use crate::normalize::Row;
use crate::types::BoundaryRecord;
use geo::MultiPolygon;
use geojson::GeoJson;
use serde_json::Value;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use tracing::{debug, info};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// One page of the DHS `data` endpoint.
#[derive(Debug, Clone)]
pub struct IndicatorPage {
    pub rows: Vec<Row>,
    pub page: u32,
    pub total_pages: u32,
}

pub fn indicator_url(base: &str, page: u32, per_page: u32) -> String {
    format!(
        "{}?breakdown={}&countryIds={}&indicatorIds={}&perpage={}&page={}",
        base,
        BREAKDOWN,
        COUNTRY_CODE,
        INDICATOR_CODES.join(","),
        per_page,
        page
    )
}

async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await.map_err(|source| Error::Fetch {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|source| Error::Fetch {
        url: url.to_string(),
        source,
    })?;
    Ok(body.to_vec())
}

/// Fetches every page of indicator rows, one request after another.
pub async fn fetch_indicator_rows(client: &reqwest::Client, sources: &SourcesConfig) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut page = 1;

    loop {
        let url = indicator_url(&sources.indicator_api, page, sources.per_page);
        debug!("GET {}", url);
        let body = get_bytes(client, &url).await?;
        let parsed = parse_indicator_page(&body)?;
        info!(
            "Indicator page {}/{}: {} rows",
            page, parsed.total_pages, parsed.rows.len()
        );
        rows.extend(parsed.rows);

        // The echoed page number is not trusted; only TotalPages bounds the walk
        if page >= parsed.total_pages {
            break;
        }
        page += 1;
    }

    Ok(rows)
}

pub fn parse_indicator_page(body: &[u8]) -> Result<IndicatorPage> {
    let mut payload: serde_json::Map<String, Value> = serde_json::from_slice(body)?;

    let rows = match payload.remove("Data") {
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                other => Err(Error::Parse(format!("Data[{}] is not an object: {}", i, other))),
            })
            .collect::<Result<Vec<Row>>>()?,
        Some(_) => return Err(Error::Parse("'Data' is not an array".to_string())),
        None => return Err(Error::Parse("response has no 'Data' field".to_string())),
    };

    let number = |key: &str| payload.get(key).and_then(Value::as_u64).map(|n| n as u32);
    let page = number("Page").unwrap_or(1).max(1);
    let total_pages = number("TotalPages").unwrap_or(page).max(page);

    Ok(IndicatorPage { rows, page, total_pages })
}

pub async fn fetch_boundaries(client: &reqwest::Client, url: &str) -> Result<Vec<BoundaryRecord>> {
    info!("Downloading boundaries from {}", url);
    let body = get_bytes(client, url).await?;
    info!("Boundary payload: {} bytes", body.len());
    parse_boundary_payload(&body)
}

/// Accepts a zip archive holding a GeoJSON file, or bare GeoJSON.
pub fn parse_boundary_payload(body: &[u8]) -> Result<Vec<BoundaryRecord>> {
    if body.starts_with(ZIP_MAGIC) {
        let text = read_geojson_entry(body)?;
        parse_boundary_geojson(&text)
    } else {
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::Parse(format!("boundary payload is not UTF-8: {}", e)))?;
        parse_boundary_geojson(text)
    }
}

fn read_geojson_entry(body: &[u8]) -> Result<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(body))?;

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let name = file.name().to_lowercase();
        if name.ends_with(".json") || name.ends_with(".geojson") {
            debug!("Reading archive entry {}", file.name());
            let mut buffer = String::new();
            file.read_to_string(&mut buffer)?;
            return Ok(buffer);
        }
    }

    Err(Error::Parse("archive contains no .json/.geojson entry".to_string()))
}

pub fn parse_boundary_geojson(text: &str) -> Result<Vec<BoundaryRecord>> {
    let geojson: GeoJson = text.parse()?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(Error::Parse("boundary GeoJSON must be a FeatureCollection".to_string())),
    };

    let mut seen = HashSet::new();
    let mut boundaries = Vec::new();

    for feature in collection.features {
        let name = match feature.property(BOUNDARY_NAME_PROPERTY) {
            Some(Value::String(s)) => s.clone(),
            _ => continue, // Skip if no name
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| Error::Parse(format!("region '{}': {:?}", name, e)))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        if !seen.insert(name.clone()) {
            return Err(Error::Parse(format!("duplicate boundary region '{}'", name)));
        }

        boundaries.push(BoundaryRecord { name, geometry });
    }

    Ok(boundaries)
}
