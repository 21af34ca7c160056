//! # Error Kinds
//!
//! Every failure in the forecast pipeline is reported as a [`ForecastError`].
//! Nothing in the library recovers locally: errors abort the pipeline and are
//! surfaced to the caller, which decides how to report them.

use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while producing a forecast map
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid model run: {0}")]
    InvalidModelRun(String),

    #[error("Target instant {target} is before model run {run}")]
    TargetBeforeRun {
        run: DateTime<Utc>,
        target: DateTime<Utc>,
    },

    #[error("Data not downloaded, may not be ready yet: {url} returned HTTP {status}")]
    DataNotReady { url: String, status: u16 },

    #[error("Timed out fetching {url}")]
    FetchTimeout { url: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Missing coordinate: {0}")]
    MissingCoordinate(String),

    #[error("Missing variable: {0}")]
    MissingVariable(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Empty selection: {0}")]
    EmptySelection(String),

    #[error("GRIB error: {0}")]
    Grib(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForecastError {
    /// Short, stable name of the error kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InvalidConfiguration(_) => "InvalidConfiguration",
            ForecastError::InvalidModelRun(_) => "InvalidModelRun",
            ForecastError::TargetBeforeRun { .. } => "TargetBeforeRun",
            ForecastError::DataNotReady { .. } => "DataNotReady",
            ForecastError::FetchTimeout { .. } => "FetchTimeout",
            ForecastError::Transport(_) => "Transport",
            ForecastError::MissingCoordinate(_) => "MissingCoordinate",
            ForecastError::MissingVariable(_) => "MissingVariable",
            ForecastError::ShapeMismatch(_) => "ShapeMismatch",
            ForecastError::EmptySelection(_) => "EmptySelection",
            ForecastError::Grib(_) => "Grib",
            ForecastError::Render(_) => "Render",
            ForecastError::Storage(_) => "Storage",
            ForecastError::Io(_) => "Io",
        }
    }
}

/// Result type for forecast pipeline operations
pub type ForecastResult<T> = Result<T, ForecastError>;
