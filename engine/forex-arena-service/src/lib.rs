//! Forex Arena Production Service Library
//!
//! Wires the market feed, account service and API gateway into one process:
//! configuration loading, component initialization, and graceful shutdown
//! on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use std::path::Path;

pub mod config;
pub mod logging;
pub mod service;
pub mod signals;

pub use config::{LoggingConfig, ServiceConfig, ServiceSettings};
pub use logging::initialize_logging;
pub use service::ServiceState;
pub use signals::{graceful_shutdown, setup_signal_handlers, wait_for_shutdown};

/// Load configuration from an optional file and environment variables
pub fn load_configuration(config_file: Option<&Path>) -> Result<ServiceConfig> {
    config::load_config(config_file).context("Failed to load service configuration")
}
