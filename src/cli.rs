//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// EpicEta - epic rollups and release ETA from tracker exports
///
/// Reads numbered issue-tracker export pages (data1.json, data2.json, ...),
/// rolls story points up into "mvp" epics, and projects a completion date
/// from the team velocity, snapped to the Wednesday release cadence.
///
/// Examples:
///   epiceta --dir ./exports
///   epiceta --dir ./exports --velocity 32 --hardening 2
///   epiceta --url https://exports.example.com/mvp --format json -o rollup.json
///   epiceta --velocity 35 --save-settings
///   epiceta --reset-settings --save-settings
///   epiceta --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing the export pages
    ///
    /// Defaults to the current directory, or [source].dir in the config.
    /// Takes precedence over --url and EPICETA_URL.
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Base URL serving the export pages over HTTP
    #[arg(short, long, value_name = "URL", env = "EPICETA_URL")]
    pub url: Option<String>,

    /// Page file name pattern; `{}` is replaced by the page number
    #[arg(long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Maximum number of pages to read
    #[arg(long, value_name = "COUNT")]
    pub max_pages: Option<usize>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Team velocity: points completed per two-week iteration (default 40)
    #[arg(long, value_name = "POINTS", env = "EPICETA_VELOCITY")]
    pub velocity: Option<u32>,

    /// Points assumed for an epic with fewer than 30 linked points (default 40)
    #[arg(long, value_name = "POINTS", env = "EPICETA_POINTS")]
    pub points: Option<u32>,

    /// Hardening buffer added to the ETA, in weeks (default 0)
    #[arg(long, value_name = "WEEKS", env = "EPICETA_HARDENING")]
    pub hardening: Option<u32>,

    /// Reset velocity, points and hardening to their defaults
    #[arg(long)]
    pub reset_settings: bool,

    /// Persist the effective velocity, points and hardening to the config file
    #[arg(long)]
    pub save_settings: bool,

    /// Project from this date instead of today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Tracker base URL for epic links (<URL>/browse/<KEY>)
    #[arg(long, value_name = "URL", env = "EPICETA_TRACKER_URL")]
    pub tracker_url: Option<String>,

    /// Label marking features that belong to the rollup
    #[arg(long, value_name = "LABEL")]
    pub epic_label: Option<String>,

    /// Issue type name the tracker uses for features
    #[arg(long, value_name = "NAME")]
    pub feature_type: Option<String>,

    /// Output file path for the report (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .epiceta.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .epiceta.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Export URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref pattern) = self.pattern {
            if !pattern.contains("{}") {
                return Err("Page pattern must contain '{}' for the page number".to_string());
            }
        }

        if self.velocity == Some(0) {
            return Err("Velocity must be at least 1 point per iteration".to_string());
        }

        if self.max_pages == Some(0) {
            return Err("Max pages must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.dir {
            if !dir.is_dir() {
                return Err(format!("Export directory does not exist: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
