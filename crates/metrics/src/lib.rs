//! Metrics collection and export for therra.
//!
//! All crates record through the `metrics` facade using the names in
//! definitions module (re-exported at the crate root). With the `prometheus` feature the
//! gateway installs a Prometheus recorder and serves `/metrics`; without it
//! every macro is a no-op.
//!
//! ```rust,ignore
//! use therra_metrics::{counter, pipeline};
//!
//! counter!(pipeline::MESSAGES_TOTAL, "channel" => "telegram").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
