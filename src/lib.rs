//! datadash: upload a CSV file, clean it, and explore it in a browser dashboard.
//!
//! The [`wrangle`] module holds the cleaning pipeline; [`charts`] and [`statistics`] turn a
//! cleaned dataset into chart descriptions and summary tables; [`server`] exposes it all
//! over HTTP.

pub mod chart_render;
pub mod charts;
pub mod config;
pub mod dashboard;
pub mod error_display;
pub mod render;
pub mod server;
pub mod statistics;
pub mod upload;
pub mod wrangle;

pub use config::{
    AppConfig, ConfigManager, DashboardConfig, LoggingConfig, ServerConfig, WrangleConfig,
};
pub use dashboard::{Dashboard, DashboardParams, Panel, PanelOutcome};
pub use wrangle::{wrangle, CleanedDataset, WrangleOptions, Wrangled};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

/// Application name used for the config directory
pub const APP_NAME: &str = "datadash";

/// Install the global tracing subscriber. `RUST_LOG`, when set, overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| eyre!("Failed to initialize logging: {}", e))
}
