// crates/hebtools-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file could not be parsed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid dataset glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Input column '{column}' violates the input contract: {reason}")]
    InputContract { column: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn contract(column: &str, reason: impl Into<String>) -> Self {
        PipelineError::InputContract {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
