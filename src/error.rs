//! Error types shared by ingestion, detection and reporting.

use thiserror::Error;

use crate::data::model::Feature;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Errors raised by the library.
///
/// The 50/20 record gates of the detection pipeline are not errors; they are
/// reported through [`crate::detect::ShortCircuit`].
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Malformed row or timestamp components (fatal to the affected year).
    #[error("data format error: {0}")]
    DataFormat(String),

    /// The isolation forest could not be fitted.
    #[error("scoring error: {0}")]
    Scoring(String),

    /// A feature has zero (or undefined) standard deviation.
    #[error("degenerate distribution: {feature} has zero standard deviation")]
    DegenerateDistribution { feature: Feature },

    /// Rejected configuration value.
    #[error("invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `csv::Error` already prefixes its message with "CSV error".
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl DetectionError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        DetectionError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the batch driver may recover by treating the month as
    /// anomaly-free.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DetectionError::Scoring(_) | DetectionError::DegenerateDistribution { .. }
        )
    }
}
