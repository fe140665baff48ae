//! Configuration file handling.
//!
//! This module handles loading, merging and saving configuration from
//! `.epiceta.toml` files. The `[settings]` table is where projection
//! settings persist between runs.

use crate::analysis::normalizer::DEFAULT_FEATURE_TYPE;
use crate::analysis::DEFAULT_EPIC_LABEL;
use crate::cli::OutputFormat;
use crate::models::Settings;
use crate::source::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_PATTERN};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".epiceta.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Projection settings (velocity, per-epic floor, hardening).
    #[serde(default)]
    pub settings: Settings,

    /// Where export pages come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Tracker conventions.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Export page source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory holding the page files.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Base URL serving the pages. Takes precedence over `dir` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Page file name; `{}` is replaced by the page number.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Maximum pages read per run.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            url: None,
            pattern: default_pattern(),
            max_pages: default_max_pages(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_pattern() -> String {
    DEFAULT_PAGE_PATTERN.to_string()
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_timeout() -> u64 {
    30
}

/// Issue tracker conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL for issue links (`<base_url>/browse/<key>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Issue type name of features.
    #[serde(default = "default_feature_type")]
    pub feature_type: String,

    /// Label that puts a feature in the rollup.
    #[serde(default = "default_epic_label")]
    pub epic_label: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            feature_type: default_feature_type(),
            epic_label: default_epic_label(),
        }
    }
}

fn default_feature_type() -> String {
    DEFAULT_FEATURE_TYPE.to_string()
}

fn default_epic_label() -> String {
    DEFAULT_EPIC_LABEL.to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Output file; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from `path`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Write this configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.reset_settings {
            self.settings = Settings::default();
        }

        if let Some(velocity) = args.velocity {
            self.settings.velocity = velocity;
        }
        if let Some(points) = args.points {
            self.settings.points_per_epic = points;
        }
        if let Some(hardening) = args.hardening {
            self.settings.hardening_weeks = hardening;
        }

        if let Some(ref url) = args.url {
            self.source.url = Some(url.clone());
        }
        // An explicit directory wins over any URL, configured or from the environment
        if let Some(ref dir) = args.dir {
            self.source.dir = dir.clone();
            self.source.url = None;
        }
        if let Some(ref pattern) = args.pattern {
            self.source.pattern = pattern.clone();
        }
        if let Some(max_pages) = args.max_pages {
            self.source.max_pages = max_pages;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if let Some(ref base_url) = args.tracker_url {
            self.tracker.base_url = Some(base_url.clone());
        }
        if let Some(ref label) = args.epic_label {
            self.tracker.epic_label = label.clone();
        }
        if let Some(ref feature_type) = args.feature_type {
            self.tracker.feature_type = feature_type.clone();
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref output) = args.output {
            self.report.output = Some(output.clone());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
