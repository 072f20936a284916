//! Anomaly detection for ACE solar-wind proton measurements.
//!
//! Yearly files are split into calendar months; each month runs through a
//! sanitize → IQR range filter → isolation forest → z-score pipeline and the
//! surviving extreme readings are collected into a master log.

pub mod batch;
pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod detect;
pub mod error;
pub mod report;

pub use config::{DegeneratePolicy, DetectionConfig, RunConfig};
pub use detect::{detect_anomalies, Detection};
pub use error::{DetectionError, Result};
