//! Tracing setup shared by chatmux binaries.
//!
//! Output format comes from `LOG_FORMAT`, filtering from `RUST_LOG`.

mod config;
mod tracing_init;

pub use config::{LogTarget, TelemetryConfig};
pub use tracing_init::{init_telemetry, telemetry_installed};
