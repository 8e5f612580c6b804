//! Error types for the acquisition and join pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure talking to a remote source
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote source answered with a non-2xx status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unreadable boundary archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Malformed GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload parsed but did not have the expected structure
    #[error("Unexpected payload: {0}")]
    Parse(String),

    #[error("Invalid label mapping: {0}")]
    Mapping(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl Error {
    /// True for the startup-fatal network class (as opposed to bad payloads).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Status { .. })
    }
}
