//! Error type shared by the geometry engine and the scenario pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Input files that do not have the expected layout or shape
    #[error("Format error: {0}")]
    Format(String),

    /// Degenerate curves or polygons
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Required inputs missing or inconsistent
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Unknown nodes, unreachable endpoints
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Time parse error: {0}")]
    Time(#[from] chrono::ParseError),

    #[error("Progress template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

pub type Result<T> = std::result::Result<T, ScenarioError>;
