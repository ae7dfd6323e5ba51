use std::io;
use thiserror::Error;

/// Errors raised by any pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A data-integrity invariant did not hold. Always fatal.
    #[error("integrity check '{assertion}' failed: {detail}")]
    Integrity { assertion: &'static str, detail: String },

    /// Rejected before any input is read.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no {what} found for '{key}'")]
    Missing { what: &'static str, key: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn integrity(assertion: &'static str, detail: impl Into<String>) -> Self {
        PipelineError::Integrity { assertion, detail: detail.into() }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, PipelineError::Integrity { .. })
    }
}

/// Returns an `Integrity` error from the enclosing function unless `cond` holds.
#[macro_export]
macro_rules! ensure_integrity {
    ($cond:expr, $assertion:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::PipelineError::integrity($assertion, format!($($arg)+)));
        }
    };
}
