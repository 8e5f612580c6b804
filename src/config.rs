use serde::Deserialize;
use std::path::Path;
use std::fs;
use anyhow::{Context, Result};

/// Country, breakdown and indicator selection are fixed for this dashboard.
pub const COUNTRY_CODE: &str = "ET";
pub const BREAKDOWN: &str = "subnational";
pub const INDICATOR_CODES: [&str; 8] = [
    "HC_ELEC_H_ELC", // Households with electricity
    "HC_ELEC_H_NEL", // Households with no electricity
    "HC_ELEC_P_ELC", // Population with electricity
    "HC_ELEC_P_NEL", // Population with no electricity
    "WS_SRCE_H_IMP", // Households using an improved water source
    "WS_SRCE_H_IOP", // Households with improved water source on the premises
    "WS_SRCE_P_IMP", // Population using an improved water source
    "WS_SRCE_P_IOP", // Population with improved water source on the premises
];

/// Feature property holding the region name in GADM level-1 files.
pub const BOUNDARY_NAME_PROPERTY: &str = "NAME_1";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub map: MapConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// DHS indicator data endpoint, without query string
    pub indicator_api: String,
    /// GADM level-1 archive (zipped GeoJSON) or plain GeoJSON URL
    pub boundary_archive: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub low_color: String,  // Hex code
    pub high_color: String, // Hex code
    pub edge_color: String, // Hex code
}

impl Default for MapConfig {
    fn default() -> Self {
        // "Purples" ramp end points, grey outlines
        Self {
            width: 720,
            height: 540,
            padding: 16,
            low_color: "#fcfbfd".to_string(),
            high_color: "#3f007d".to_string(),
            edge_color: "#808080".to_string(),
        }
    }
}

fn default_per_page() -> u32 {
    1000
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
