use color_eyre::eyre::eyre;
use color_eyre::Result;
use datadash_cli::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::wrangle::{DEFAULT_DATE_COLUMNS, DEFAULT_NULL_VALUES};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub server: ServerConfig,
    pub wrangle: WrangleConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Relative paths are resolved against the working directory
    pub upload_dir: PathBuf,
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WrangleConfig {
    /// Column names tried, in order, for the date index
    pub date_columns: Vec<String>,
    /// Cell values treated as missing
    pub null_values: Vec<String>,
    /// Rows sampled for type inference; unset scans the whole file
    pub infer_schema_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub default_rows: usize,
    pub max_rows: usize,
    pub chart_row_limit: usize,
    pub chart_width: u32,
    pub chart_height: u32,
    pub histogram_max_bins: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            server: ServerConfig::default(),
            wrangle: WrangleConfig::default(),
            dashboard: DashboardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8050,
            upload_dir: PathBuf::from("uploads"),
            max_upload_mb: 32,
        }
    }
}

impl Default for WrangleConfig {
    fn default() -> Self {
        Self {
            date_columns: DEFAULT_DATE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            infer_schema_length: None,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_rows: 5,
            max_rows: 19,
            chart_row_limit: 10_000,
            chart_width: 640,
            chart_height: 400,
            histogram_max_bins: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user, or default → explicit file)
    pub fn load(app_name: &str, explicit: Option<&Path>) -> Result<Self> {
        let mut config = AppConfig::default();

        match explicit {
            // An explicitly requested file must exist and parse
            Some(path) => config.merge(Self::load_file(path)?),
            None => {
                if let Ok(user_config) = Self::load_user_config(app_name) {
                    config.merge(user_config);
                }
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Load user configuration from ~/.config/datadash/config.toml
    fn load_user_config(app_name: &str) -> Result<AppConfig> {
        let config_manager = ConfigManager::new(app_name)?;
        let config_path = config_manager.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        Self::load_file(&config_path)
    }

    /// Parse a single TOML config file
    pub fn load_file(config_path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.server.merge(other.server);
        self.wrangle.merge(other.wrangle);
        self.dashboard.merge(other.dashboard);
        self.logging.merge(other.logging);
    }

    /// Command-line flags override every file layer
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(upload_dir) = &args.upload_dir {
            self.server.upload_dir = upload_dir.clone();
        }
        if let Some(level) = args.log_level {
            self.logging.level = level.as_str().to_string();
        }
        if args.log_json {
            self.logging.json = true;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.server.port == 0 {
            return Err(eyre!("port must be greater than 0"));
        }

        if self.server.max_upload_mb == 0 {
            return Err(eyre!("max_upload_mb must be greater than 0"));
        }

        if self.wrangle.date_columns.is_empty() {
            return Err(eyre!("date_columns must list at least one column name"));
        }

        if self.dashboard.default_rows > self.dashboard.max_rows {
            return Err(eyre!(
                "default_rows ({}) must not exceed max_rows ({})",
                self.dashboard.default_rows,
                self.dashboard.max_rows
            ));
        }

        if self.dashboard.chart_width == 0 || self.dashboard.chart_height == 0 {
            return Err(eyre!("chart_width and chart_height must be greater than 0"));
        }

        if self.dashboard.chart_row_limit == 0 {
            return Err(eyre!("chart_row_limit must be greater than 0"));
        }

        if self.dashboard.histogram_max_bins == 0 {
            return Err(eyre!("histogram_max_bins must be greater than 0"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(eyre!(
                "Invalid log level: {}. Must be one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }

    /// Largest accepted request body, in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb * 1024 * 1024
    }
}

// Merge implementations for each config section
impl ServerConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ServerConfig::default();
        if other.host != default.host {
            self.host = other.host;
        }
        if other.port != default.port {
            self.port = other.port;
        }
        if other.upload_dir != default.upload_dir {
            self.upload_dir = other.upload_dir;
        }
        if other.max_upload_mb != default.max_upload_mb {
            self.max_upload_mb = other.max_upload_mb;
        }
    }
}

impl WrangleConfig {
    pub fn merge(&mut self, other: Self) {
        let default = WrangleConfig::default();
        if other.date_columns != default.date_columns {
            self.date_columns = other.date_columns;
        }
        if other.null_values != default.null_values {
            self.null_values = other.null_values;
        }
        if other.infer_schema_length.is_some() {
            self.infer_schema_length = other.infer_schema_length;
        }
    }
}

impl DashboardConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DashboardConfig::default();
        if other.default_rows != default.default_rows {
            self.default_rows = other.default_rows;
        }
        if other.max_rows != default.max_rows {
            self.max_rows = other.max_rows;
        }
        if other.chart_row_limit != default.chart_row_limit {
            self.chart_row_limit = other.chart_row_limit;
        }
        if other.chart_width != default.chart_width {
            self.chart_width = other.chart_width;
        }
        if other.chart_height != default.chart_height {
            self.chart_height = other.chart_height;
        }
        if other.histogram_max_bins != default.histogram_max_bins {
            self.histogram_max_bins = other.histogram_max_bins;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = LoggingConfig::default();
        if other.level != default.level {
            self.level = other.level;
        }
        if other.json != default.json {
            self.json = other.json;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
