//! Markdown and JSON report generation.
//!
//! This module renders the epic rollup and project projection for
//! people and for other tools.

use crate::analysis::{largest_remaining, status_breakdown, MIN_EPIC_SCOPE_POINTS};
use crate::models::{
    browse_url, EpicSummary, Measure, ProjectSummary, Report, ReportMetadata, Settings,
};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Epic Rollup\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    output.push_str(&generate_projection_section(&report.project));

    output.push_str(&generate_settings_section(&report.settings, &report.project));

    output.push_str(&generate_epics_section(
        &report.epics,
        report.metadata.tracker_url.as_deref(),
    ));

    output.push_str(&generate_statistics_section(&report.epics));

    output.push_str(&generate_excluded_section(&report.excluded_epics));

    output.push_str(&generate_footer());

    output
}

/// Format points without a trailing `.0` for whole numbers.
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{:.0}", points)
    } else {
        format!("{}", points)
    }
}

/// Format a projected date, e.g. `2026-11-11 (Wednesday)`.
pub fn format_eta(date: NaiveDate) -> String {
    format!("{} ({})", date.format("%Y-%m-%d"), weekday_name(date))
}

fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

/// Overall progress line, e.g. `33.3% (30/90 pts)`.
pub fn format_progress(project: &ProjectSummary) -> String {
    let points = format!(
        "({}/{} pts)",
        format_points(project.completed_points),
        format_points(project.total_points)
    );
    match project.progress_percent {
        Measure::Computed(percent) => format!("{:.1}% {}", percent, points),
        Measure::Undefined(reason) => format!("No data: {} {}", reason, points),
    }
}

/// ETA line, or the reason there is none.
pub fn format_eta_measure(eta: &Measure<NaiveDate>) -> String {
    match eta {
        Measure::Computed(date) => format_eta(*date),
        Measure::Undefined(reason) => format!("No estimate: {}", reason),
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Projected From:** {}\n",
        metadata.today.format("%Y-%m-%d")
    ));
    section.push_str(&format!("- **Pages Read:** {}\n", metadata.pages_read));
    section.push_str(&format!("- **Issues Read:** {}\n", metadata.issues_read));

    if metadata.termination.is_suspect() {
        section.push_str(&format!(
            "\n> ⚠️ **Possibly incomplete data:** {}. Later pages were not read.\n",
            metadata.termination
        ));
    }
    section.push('\n');

    section
}

/// Generate the projection section.
fn generate_projection_section(project: &ProjectSummary) -> String {
    let mut section = String::new();

    section.push_str("## Projection\n\n");
    section.push_str(&format!("- **ETA:** {}\n", format_eta_measure(&project.eta)));
    section.push_str(&format!("- **Progress:** {}\n", format_progress(project)));
    section.push_str(&format!(
        "- **Remaining:** {} pts",
        format_points(project.remaining_points)
    ));
    if let Measure::Computed(days) = project.remaining_days {
        section.push_str(&format!(" (~{:.1} days)", days));
    }
    section.push_str("\n\n");

    section
}

/// Generate the settings section.
fn generate_settings_section(settings: &Settings, project: &ProjectSummary) -> String {
    let mut section = String::new();

    section.push_str("## Settings\n\n");
    section.push_str("| Velocity (pts / 2 wks) | Points per Epic | Hardening (wks) |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        settings.velocity, settings.points_per_epic, settings.hardening_weeks
    ));

    if !project.settings_are_default {
        section.push_str(
            "*Custom settings in use. Run with `--reset-settings --save-settings` to restore the defaults (40 / 40 / 0).*\n\n",
        );
    }

    section
}

/// Generate the epic table.
fn generate_epics_section(epics: &[EpicSummary], tracker_url: Option<&str>) -> String {
    let mut section = String::new();

    section.push_str("## Epics\n\n");

    if epics.is_empty() {
        section.push_str("No epics found in the export.\n\n");
        return section;
    }

    section.push_str("| Epic | Title | Completed | Total Pts | % | Status |\n");
    section.push_str("|:---|:---|---:|---:|---:|:---|\n");

    for epic in epics {
        section.push_str(&generate_epic_row(epic, tracker_url));
    }
    section.push('\n');

    if epics.iter().any(EpicSummary::is_normalized) {
        section.push_str(&format!(
            "*~~Struck~~ totals are below {} points; the per-epic estimate in parentheses is used instead.*\n\n",
            format_points(MIN_EPIC_SCOPE_POINTS)
        ));
    }

    section
}

/// Generate one epic table row.
fn generate_epic_row(epic: &EpicSummary, tracker_url: Option<&str>) -> String {
    let key = match tracker_url {
        Some(base) => format!("[{}]({})", epic.key, browse_url(base, &epic.key)),
        None => epic.key.clone(),
    };

    let total = if epic.is_normalized() {
        format!(
            "~~{}~~ ({})",
            format_points(epic.total_points),
            format_points(epic.normalized_total_points)
        )
    } else {
        format_points(epic.total_points)
    };

    let status = epic
        .status
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "| {} | {} | {} | {} | {}% | {} {} |\n",
        key,
        epic.title.as_deref().unwrap_or("").replace('|', "\\|"),
        format_points(epic.done_points),
        total,
        epic.progress_percent,
        progress_bar(epic.progress_percent),
        status
    )
}

/// Ten-cell text bar for a percentage.
fn progress_bar(percent: u32) -> String {
    let filled = (percent.min(100) / 10) as usize;
    format!("`{}{}`", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Generate the statistics section.
fn generate_statistics_section(epics: &[EpicSummary]) -> String {
    let mut section = String::new();

    let statuses = status_breakdown(epics);
    if !statuses.is_empty() {
        section.push_str("### Epics by Status\n\n");
        section.push_str("| Status | Epics |\n");
        section.push_str("|:---|:---:|\n");

        let mut statuses: Vec<_> = statuses.iter().collect();
        statuses.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (status, count) in statuses {
            section.push_str(&format!("| {} | {} |\n", status, count));
        }
        section.push('\n');
    }

    let remaining = largest_remaining(epics, 5);
    if !remaining.is_empty() {
        section.push_str("### Largest Remaining Scope\n\n");
        section.push_str("| Epic | Remaining Pts |\n");
        section.push_str("|:---|:---:|\n");

        for (epic, points) in remaining {
            section.push_str(&format!("| `{}` | {} |\n", epic.key, format_points(points)));
        }
        section.push('\n');
    }

    section
}

/// Generate the excluded-epics note.
fn generate_excluded_section(excluded: &[String]) -> String {
    if excluded.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Excluded Epics\n\n");
    section.push_str("These epics have no scoped points and are left out of the projection:\n\n");
    for key in excluded {
        section.push_str(&format!("- `{}`\n", key));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by EpicEta*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
