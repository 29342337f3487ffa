//! # Warden Observe - Logging and Metrics
//!
//! Observability primitives shared by the Warden crates: structured logging
//! initialization and metric recording helpers.

pub mod logging;
pub mod metrics;

pub use logging::{LogConfig, LogFormat, init_logging};
