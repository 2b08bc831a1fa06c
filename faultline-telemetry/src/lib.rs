//! # Faultline Telemetry
//!
//! Crate for logging and metrics of attack executions.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::{MetricsRecorder, Phase};
