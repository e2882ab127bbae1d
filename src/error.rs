//! Error types for forecasting operations

use thiserror::Error;

/// Errors raised by the forecasting pipeline
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The supplied series or hyperparameters cannot be used
    #[error("Input error: {0}")]
    Input(String),

    /// An operation needs state that has not been established yet
    #[error("State error: {0}")]
    State(String),

    /// Tensor data could not be read back from the backend
    #[error("Model error: {0}")]
    Model(String),

    /// Filesystem failure while reading data or writing reports
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular data could not be loaded
    #[error("Data error: {0}")]
    Data(#[from] polars::error::PolarsError),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
