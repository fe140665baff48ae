//! Project progress and completion-date projection.

use crate::models::{EpicSummary, Measure, NoDataReason, ProjectSummary, Settings};
use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Length of one velocity iteration, in days.
pub const ITERATION_DAYS: f64 = 14.0;

/// Weekday every projected date is snapped forward to.
pub const CADENCE_ANCHOR: Weekday = Weekday::Wed;

/// Summarize progress over all epics and project an ETA from `today`.
pub fn summarize_project(
    epics: &[EpicSummary],
    settings: &Settings,
    today: NaiveDate,
) -> ProjectSummary {
    let completed_points: f64 = epics.iter().map(|e| e.done_points).sum();
    let total_points: f64 = epics.iter().map(|e| e.normalized_total_points).sum();
    let remaining_points = (total_points - completed_points).max(0.0);

    let remaining_days = remaining_days(remaining_points, settings);
    let eta = match remaining_days {
        Measure::Computed(days) => match project_eta(today, days) {
            Some(date) => Measure::Computed(date),
            None => Measure::Undefined(NoDataReason::OutOfRange),
        },
        Measure::Undefined(reason) => Measure::Undefined(reason),
    };

    ProjectSummary {
        completed_points,
        total_points,
        remaining_points,
        remaining_days,
        progress_percent: progress_percent(completed_points, total_points),
        eta,
        settings_are_default: settings.is_default(),
    }
}

/// Completion percentage truncated (not rounded) to one decimal place.
pub fn progress_percent(completed_points: f64, total_points: f64) -> Measure<f64> {
    if total_points <= 0.0 {
        return Measure::Undefined(NoDataReason::NoScopedPoints);
    }
    let per_mille = (completed_points * 1000.0 / total_points).floor();
    Measure::Computed(per_mille.clamp(0.0, 1000.0) / 10.0)
}

/// Calendar days needed for `remaining_points`, plus the hardening buffer.
pub fn remaining_days(remaining_points: f64, settings: &Settings) -> Measure<f64> {
    if settings.velocity == 0 {
        return Measure::Undefined(NoDataReason::ZeroVelocity);
    }
    let work_days = remaining_points / f64::from(settings.velocity) * ITERATION_DAYS;
    let hardening_days = f64::from(settings.hardening_weeks) * 7.0;
    Measure::Computed(work_days + hardening_days)
}

/// Project a completion date: `today` plus the whole days of `remaining_days`,
/// then forward to the cadence anchor. A date already on the anchor stays.
///
/// Returns `None` when the result would not fit in the calendar.
pub fn project_eta(today: NaiveDate, remaining_days: f64) -> Option<NaiveDate> {
    let offset = remaining_days.max(0.0).trunc() as u64;
    let raw = today.checked_add_days(Days::new(offset))?;
    snap_to_cadence(raw)
}

/// Move `date` forward to the next cadence anchor day, on or after it.
pub fn snap_to_cadence(date: NaiveDate) -> Option<NaiveDate> {
    let anchor = CADENCE_ANCHOR.num_days_from_sunday();
    let weekday = date.weekday().num_days_from_sunday();
    let days_until_anchor = (anchor + 7 - weekday) % 7;
    date.checked_add_days(Days::new(u64::from(days_until_anchor)))
}
