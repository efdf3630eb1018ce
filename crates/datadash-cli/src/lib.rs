//! Shared CLI definitions for datadash.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Name used in config files and tracing filter directives
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Command-line arguments for datadash
#[derive(Clone, Parser, Debug)]
#[command(
    name = "datadash",
    version,
    about = "Upload a CSV, clean it, and explore it in a browser dashboard",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Read configuration from this file instead of ~/.config/datadash/config.toml
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to bind the web server to (default: 127.0.0.1)
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Port to listen on (default: 8050)
    #[arg(long = "port")]
    pub port: Option<u16>,

    /// Directory where uploaded CSV files are stored (created if missing)
    #[arg(long = "upload-dir", value_name = "DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Log verbosity. RUST_LOG, when set, takes precedence.
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Emit logs as JSON lines
    #[arg(long = "log-json", action)]
    pub log_json: bool,

    /// Clean a CSV file, print its summaries and exit without starting the server
    #[arg(long = "clean", value_name = "PATH")]
    pub clean: Option<PathBuf>,

    /// Write the cleaned data to this CSV file (requires --clean)
    #[arg(long = "output", value_name = "PATH", requires = "clean")]
    pub output: Option<PathBuf>,

    /// Generate default configuration file at ~/.config/datadash/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let mut parts = Vec::new();
        if let Some(s) = arg.get_short() {
            parts.push(format!("-{s}"));
        }
        if let Some(l) = arg.get_long() {
            parts.push(format!("--{l}"));
        }
        let op = parts.join(", ");
        let placeholder: String = if arg.get_action().takes_values() {
            arg.get_value_names()
                .map(|names| {
                    names
                        .iter()
                        .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default()
        } else {
            String::new()
        };
        let option_str = if placeholder.is_empty() {
            op
        } else {
            format!("{op} {placeholder}")
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
