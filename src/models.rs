//! Data models for the epic rollup.
//!
//! This module contains the core data structures used throughout
//! the application for representing issues, epic summaries, the
//! project projection, and the final report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default velocity: story points completed per two-week iteration.
pub const DEFAULT_VELOCITY: u32 = 40;

/// Default point estimate for an under-scoped epic.
pub const DEFAULT_POINTS_PER_EPIC: u32 = 40;

/// Default stabilization buffer, in weeks.
pub const DEFAULT_HARDENING_WEEKS: u32 = 0;

/// Workflow status of an issue as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    ToDo,
    InProgress,
    Done,
    /// Any workflow status the rollup has no rule for (e.g. "In Review").
    Other(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::ToDo => write!(f, "To Do"),
            Status::InProgress => write!(f, "In Progress"),
            Status::Done => write!(f, "Done"),
            Status::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "To Do" => Status::ToDo,
            "In Progress" => Status::InProgress,
            "Done" => Status::Done,
            other => Status::Other(other.to_string()),
        }
    }
}

/// Issue type, as far as the rollup cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Top-level feature; an epic candidate.
    Feature,
    /// Anything else (story, task, bug...), keeping the tracker's name.
    Other(String),
}

/// A single tracker issue, normalized from a raw export entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker key, e.g. `PROJ-123`.
    pub key: String,
    pub issue_type: IssueType,
    pub title: Option<String>,
    pub labels: BTreeSet<String>,
    /// Story points. Absent when the field is unset or not a valid estimate.
    pub point: Option<f64>,
    pub status: Option<Status>,
    /// Key of the parent issue, if linked.
    pub parent_key: Option<String>,
}

impl Issue {
    /// Story points, with an absent estimate counting as zero.
    pub fn points(&self) -> f64 {
        self.point.unwrap_or(0.0)
    }

    pub fn is_done(&self) -> bool {
        self.status == Some(Status::Done)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Numeric projection settings.
///
/// Passed explicitly into the aggregator and calculator on each refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Points completed per 14-day iteration.
    #[serde(default = "default_velocity")]
    pub velocity: u32,
    /// Estimate substituted for epics below the minimum scope.
    #[serde(default = "default_points_per_epic")]
    pub points_per_epic: u32,
    /// Fixed buffer added to the projection, in whole weeks.
    #[serde(default = "default_hardening_weeks")]
    pub hardening_weeks: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            velocity: DEFAULT_VELOCITY,
            points_per_epic: DEFAULT_POINTS_PER_EPIC,
            hardening_weeks: DEFAULT_HARDENING_WEEKS,
        }
    }
}

fn default_velocity() -> u32 {
    DEFAULT_VELOCITY
}

fn default_points_per_epic() -> u32 {
    DEFAULT_POINTS_PER_EPIC
}

fn default_hardening_weeks() -> u32 {
    DEFAULT_HARDENING_WEEKS
}

impl Settings {
    /// Whether every setting equals its default, i.e. nothing to reset.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.velocity == 0 {
            return Err("Velocity must be at least 1 point per iteration".to_string());
        }
        Ok(())
    }
}

/// Why a figure could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    /// No epic carries any scoped points.
    NoScopedPoints,
    /// Velocity is zero, so no completion date exists.
    ZeroVelocity,
    /// The projected date falls outside the representable calendar.
    OutOfRange,
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoDataReason::NoScopedPoints => write!(f, "no scoped points"),
            NoDataReason::ZeroVelocity => write!(f, "velocity is zero"),
            NoDataReason::OutOfRange => write!(f, "date out of range"),
        }
    }
}

/// A derived figure that is either computed or explicitly undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Measure<T> {
    Computed(T),
    Undefined(NoDataReason),
}

/// Rollup of one epic and its linked children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicSummary {
    pub key: String,
    pub title: Option<String>,
    /// Derived status; see the aggregator for the promotion rule.
    pub status: Option<Status>,
    pub done_points: f64,
    /// Raw sum of the children's points.
    pub total_points: f64,
    /// `total_points`, or the configured floor when under-scoped.
    pub normalized_total_points: f64,
    pub done_count: usize,
    pub total_count: usize,
    /// Truncated integer percentage, 0-100.
    pub progress_percent: u32,
}

impl EpicSummary {
    /// Whether the raw total was replaced by the under-scope floor.
    pub fn is_normalized(&self) -> bool {
        self.normalized_total_points != self.total_points
    }
}

/// Project-wide progress and completion projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub completed_points: f64,
    pub total_points: f64,
    pub remaining_points: f64,
    /// Calendar days of remaining work, hardening included.
    pub remaining_days: Measure<f64>,
    /// Percentage truncated to one decimal place.
    pub progress_percent: Measure<f64>,
    /// Projected date, always a Wednesday.
    pub eta: Measure<NaiveDate>,
    /// True when all settings are at their defaults.
    pub settings_are_default: bool,
}

/// How page retrieval ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The source reported no further pages.
    Exhausted,
    /// A page had no `issues` collection.
    Malformed { page: usize },
    /// A page could not be fetched or parsed. Data may be truncated.
    Failed { page: usize, reason: String },
    /// The configured page limit was reached.
    PageLimit,
}

impl Termination {
    /// Whether retrieval may have missed real data.
    pub fn is_suspect(&self) -> bool {
        matches!(self, Termination::Failed { .. } | Termination::PageLimit)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exhausted => write!(f, "all pages read"),
            Termination::Malformed { page } => {
                write!(f, "page {} has no issues collection", page)
            }
            Termination::Failed { page, reason } => {
                write!(f, "page {} failed: {}", page, reason)
            }
            Termination::PageLimit => write!(f, "page limit reached"),
        }
    }
}

/// Metadata about the rollup report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the export pages were read from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Date the projection counts from.
    pub today: NaiveDate,
    pub pages_read: usize,
    pub issues_read: usize,
    pub termination: Termination,
    /// Tracker base URL used for epic links.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_url: Option<String>,
}

/// The complete rollup report handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub settings: Settings,
    /// Epic summaries, highest progress first.
    pub epics: Vec<EpicSummary>,
    /// Epics dropped for having no scoped points.
    pub excluded_epics: Vec<String>,
    pub project: ProjectSummary,
}

/// Tracker URL for an issue key: `<base-url>/browse/<key>`.
pub fn browse_url(base_url: &str, key: &str) -> String {
    format!("{}/browse/{}", base_url.trim_end_matches('/'), key)
}
