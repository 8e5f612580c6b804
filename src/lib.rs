//! DHS indicators for Ethiopia joined with GADM region boundaries, served as
//! a small dashboard (choropleth, bar chart, trend chart, table).

pub mod charts;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod join;
pub mod normalize;
pub mod reconcile;
pub mod render;
pub mod server;
pub mod types;
pub mod views;

pub use error::{Error, Result};
pub use server::{build_router, AppState};
