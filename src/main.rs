//! EpicEta - epic rollups and release ETA projection
//!
//! A CLI tool that reads paged issue-tracker exports, rolls child-issue
//! story points up into epics, and projects a completion date from the
//! team velocity.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid arguments, unreadable config, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;

use analysis::{aggregate_epics, summarize_project, Normalizer};
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use models::{Report, ReportMetadata, Settings};
use source::{
    collect_issues, CollectOptions, DirectorySource, ExportSource, HttpSource, PageSource,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("EpicEta v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_rollup(args).await {
        error!("Rollup failed: {}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .epiceta.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the export location, tracker URL, and velocity.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report printed to stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one full refresh: read pages, aggregate, project, render.
async fn run_rollup(args: Args) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    let mut config = load_config(&args, &config_path)?;
    config.merge_with_args(&args);
    config.settings.validate().map_err(anyhow::Error::msg)?;

    if args.save_settings {
        save_settings(&config_path, &config.settings)?;
    }

    debug!("Effective settings: {:?}", config.settings);

    // Step 1: Read the export
    let export = build_source(&config)?;
    let normalizer = Normalizer::new(config.tracker.feature_type.clone());
    let options = CollectOptions {
        max_pages: config.source.max_pages,
        show_progress: !args.quiet,
    };

    let harvest = collect_issues(&export, &normalizer, &options).await;

    if harvest.termination.is_suspect() {
        warn!(
            "Export may be incomplete ({}); the projection only covers {} pages",
            harvest.termination, harvest.pages_read
        );
    }

    // Step 2: Roll up epics and project
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let rollup = aggregate_epics(&harvest.issues, &config.tracker.epic_label, &config.settings);
    let project = summarize_project(&rollup.epics, &config.settings, today);

    info!(
        "{} epics rolled up from {} issues",
        rollup.epics.len(),
        harvest.issues.len()
    );
    if !rollup.excluded.is_empty() {
        info!(
            "{} epics have no scoped points and were left out",
            rollup.excluded.len()
        );
    }

    let report = Report {
        metadata: ReportMetadata {
            source: export.describe(),
            generated_at: Utc::now(),
            today,
            pages_read: harvest.pages_read,
            issues_read: harvest.issues.len(),
            termination: harvest.termination,
            tracker_url: config.tracker.base_url.clone(),
        },
        settings: config.settings,
        epics: rollup.epics,
        excluded_epics: rollup.excluded,
        project,
    };

    // Step 3: Render
    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match config.report.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;

            if !args.quiet {
                println!("\n📊 Rollup Summary:");
                println!("   Epics: {}", report.epics.len());
                println!("   Progress: {}", report::format_progress(&report.project));
                println!("   ETA: {}", report::format_eta_measure(&report.project.eta));
                println!("\n✅ Report saved to: {}", path.display());
            }
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args, path: &Path) -> Result<Config> {
    // An explicit path must exist
    if args.config.is_some() {
        info!("Loading config from: {}", path.display());
        return Config::load(path);
    }

    match Config::load_optional(path) {
        Ok(Some(config)) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Persist `settings` into the config file, keeping its other sections.
fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let mut stored = Config::load_optional(path)?.unwrap_or_default();
    stored.settings = *settings;
    stored.save(path)?;

    info!(
        "Saved settings to {} (velocity {}, points {}, hardening {})",
        path.display(),
        settings.velocity,
        settings.points_per_epic,
        settings.hardening_weeks
    );
    Ok(())
}

/// Pick the page source from the effective configuration.
fn build_source(config: &Config) -> Result<ExportSource> {
    match config.source.url {
        Some(ref url) => Ok(ExportSource::Http(HttpSource::new(
            url,
            &config.source.pattern,
            config.source.timeout_seconds,
        )?)),
        None => Ok(ExportSource::Directory(DirectorySource::new(
            config.source.dir.clone(),
            config.source.pattern.clone(),
        ))),
    }
}
