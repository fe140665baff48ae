//! Epic aggregation and statistics.
//!
//! This module rolls child issues up into their parent epics and
//! computes per-epic progress.

use crate::models::{EpicSummary, Issue, IssueType, Settings, Status};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Epics whose linked children total fewer points than this are treated
/// as under-scoped and use the configured per-epic estimate instead.
pub const MIN_EPIC_SCOPE_POINTS: f64 = 30.0;

/// Label marking a feature as part of the rollup.
pub const DEFAULT_EPIC_LABEL: &str = "mvp";

/// Result of aggregating a flat issue list into epics.
#[derive(Debug, Clone, Default)]
pub struct EpicRollup {
    /// Summaries sorted by descending progress.
    pub epics: Vec<EpicSummary>,
    /// Keys of epics left out because they have no scoped points.
    pub excluded: Vec<String>,
}

/// Counters collected for one epic before its summary is frozen.
#[derive(Debug)]
struct EpicTally<'a> {
    epic: &'a Issue,
    done_points: f64,
    total_points: f64,
    done_count: usize,
    total_count: usize,
}

impl<'a> EpicTally<'a> {
    fn new(epic: &'a Issue) -> Self {
        Self {
            epic,
            done_points: 0.0,
            total_points: 0.0,
            done_count: 0,
            total_count: 0,
        }
    }

    fn add_child(&mut self, child: &Issue) {
        let points = child.points();
        self.total_count += 1;
        self.total_points += points;
        if child.is_done() {
            self.done_count += 1;
            self.done_points += points;
        }
    }

    fn status(&self) -> Option<Status> {
        derive_status(self.epic.status.as_ref(), self.done_count)
    }
}

/// Whether an issue is an epic candidate: a feature carrying `epic_label`.
pub fn is_epic(issue: &Issue, epic_label: &str) -> bool {
    issue.issue_type == IssueType::Feature && issue.has_label(epic_label)
}

/// Status of an epic from its own status and the number of finished children.
///
/// A tracker-Done epic stays Done. Otherwise any finished child makes it
/// In Progress. Depends only on final counts, never on traversal order.
pub fn derive_status(own: Option<&Status>, done_count: usize) -> Option<Status> {
    match own {
        Some(Status::Done) => Some(Status::Done),
        _ if done_count > 0 => Some(Status::InProgress),
        other => other.cloned(),
    }
}

/// Raw total, or `points_per_epic` when the raw total is under-scoped.
pub fn normalized_total(total_points: f64, points_per_epic: u32) -> f64 {
    if total_points < MIN_EPIC_SCOPE_POINTS {
        f64::from(points_per_epic)
    } else {
        total_points
    }
}

/// Truncated percentage without the cap. An under-scoped epic with more done
/// points than its floor goes over 100.
fn raw_progress(done_points: f64, normalized_total_points: f64) -> f64 {
    (done_points * 100.0 / normalized_total_points).floor()
}

/// Truncated integer percentage, capped at 100.
fn epic_progress(done_points: f64, normalized_total_points: f64) -> u32 {
    raw_progress(done_points, normalized_total_points).clamp(0.0, 100.0) as u32
}

/// Aggregate child issues into epic summaries.
///
/// Input order does not affect the set of summaries; ties in progress keep
/// the order in which epics first appear.
pub fn aggregate_epics(issues: &[Issue], epic_label: &str, settings: &Settings) -> EpicRollup {
    let mut tallies: Vec<EpicTally<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for issue in issues.iter().filter(|i| is_epic(i, epic_label)) {
        match index.get(issue.key.as_str()) {
            Some(&slot) => {
                debug!("Duplicate epic {}; keeping the later record", issue.key);
                tallies[slot].epic = issue;
            }
            None => {
                index.insert(issue.key.as_str(), tallies.len());
                tallies.push(EpicTally::new(issue));
            }
        }
    }

    for issue in issues {
        if issue.issue_type == IssueType::Feature {
            continue;
        }
        let slot = issue
            .parent_key
            .as_deref()
            .and_then(|parent| index.get(parent));
        if let Some(&slot) = slot {
            tallies[slot].add_child(issue);
        }
    }

    let mut rollup = EpicRollup::default();

    for tally in tallies {
        let normalized_total_points = normalized_total(tally.total_points, settings.points_per_epic);

        if normalized_total_points <= 0.0 {
            debug!("Excluding epic {}: no scoped points", tally.epic.key);
            rollup.excluded.push(tally.epic.key.clone());
            continue;
        }

        rollup.epics.push(EpicSummary {
            key: tally.epic.key.clone(),
            title: tally.epic.title.clone(),
            status: tally.status(),
            done_points: tally.done_points,
            total_points: tally.total_points,
            normalized_total_points,
            done_count: tally.done_count,
            total_count: tally.total_count,
            progress_percent: epic_progress(tally.done_points, normalized_total_points),
        });
    }

    sort_epics_by_progress(&mut rollup.epics);

    debug!(
        "Aggregated {} epics ({} excluded)",
        rollup.epics.len(),
        rollup.excluded.len()
    );

    rollup
}

/// Sort epics by progress (highest first). Stable on ties.
///
/// Orders on the uncapped percentage, so an over-delivered epic ranks above
/// one that is exactly complete even though both display 100.
pub fn sort_epics_by_progress(epics: &mut [EpicSummary]) {
    epics.sort_by(|a, b| {
        let a = raw_progress(a.done_points, a.normalized_total_points);
        let b = raw_progress(b.done_points, b.normalized_total_points);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Count epics by displayed status.
pub fn status_breakdown(epics: &[EpicSummary]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for epic in epics {
        let status = epic
            .status
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        *counts.entry(status).or_default() += 1;
    }

    counts
}

/// The `n` epics with the most outstanding normalized points.
pub fn largest_remaining(epics: &[EpicSummary], n: usize) -> Vec<(&EpicSummary, f64)> {
    let mut remaining: Vec<_> = epics
        .iter()
        .map(|e| (e, (e.normalized_total_points - e.done_points).max(0.0)))
        .filter(|(_, left)| *left > 0.0)
        .collect();

    remaining.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    remaining.truncate(n);

    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn epic(key: &str, status: Status) -> Issue {
        Issue {
            key: key.to_string(),
            issue_type: IssueType::Feature,
            title: Some(format!("Epic {}", key)),
            labels: BTreeSet::from(["mvp".to_string()]),
            point: None,
            status: Some(status),
            parent_key: None,
        }
    }

    fn child(key: &str, parent: &str, points: Option<f64>, status: Status) -> Issue {
        Issue {
            key: key.to_string(),
            issue_type: IssueType::Other("Story".to_string()),
            title: None,
            labels: BTreeSet::new(),
            point: points,
            status: Some(status),
            parent_key: Some(parent.to_string()),
        }
    }

    fn two_epic_fixture() -> Vec<Issue> {
        vec![
            epic("A", Status::ToDo),
            epic("B", Status::ToDo),
            child("A-1", "A", Some(20.0), Status::Done),
            child("A-2", "A", Some(30.0), Status::ToDo),
            child("B-1", "B", Some(10.0), Status::Done),
        ]
    }

    fn find<'a>(rollup: &'a EpicRollup, key: &str) -> &'a EpicSummary {
        rollup.epics.iter().find(|e| e.key == key).unwrap()
    }

    #[test]
    fn test_two_epic_scenario() {
        let rollup = aggregate_epics(&two_epic_fixture(), "mvp", &Settings::default());

        let a = find(&rollup, "A");
        assert_eq!(a.total_points, 50.0);
        assert_eq!(a.done_points, 20.0);
        assert_eq!(a.normalized_total_points, 50.0);
        assert_eq!(a.progress_percent, 40);
        assert!(!a.is_normalized());

        let b = find(&rollup, "B");
        assert_eq!(b.total_points, 10.0);
        assert_eq!(b.normalized_total_points, 40.0);
        assert_eq!(b.progress_percent, 25);
        assert!(b.is_normalized());

        assert_eq!(rollup.epics[0].key, "A");
        assert_eq!(rollup.epics[1].key, "B");
    }

    #[test]
    fn test_under_scoped_epics_use_configured_floor() {
        let settings = Settings {
            points_per_epic: 55,
            ..Settings::default()
        };
        let issues = vec![
            epic("A", Status::ToDo),
            child("A-1", "A", Some(29.0), Status::ToDo),
            epic("B", Status::ToDo),
            child("B-1", "B", Some(30.0), Status::ToDo),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &settings);
        assert_eq!(find(&rollup, "A").normalized_total_points, 55.0);
        assert_eq!(find(&rollup, "B").normalized_total_points, 30.0);
    }

    #[test]
    fn test_only_labelled_features_are_epics() {
        let mut unlabelled = epic("C", Status::ToDo);
        unlabelled.labels.clear();
        let mut story_with_label = child("D", "A", Some(3.0), Status::ToDo);
        story_with_label.labels.insert("mvp".to_string());

        let issues = vec![
            epic("A", Status::ToDo),
            unlabelled,
            story_with_label,
            child("C-1", "C", Some(5.0), Status::Done),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &Settings::default());
        assert_eq!(rollup.epics.len(), 1);
        assert_eq!(rollup.epics[0].key, "A");
        assert_eq!(rollup.epics[0].total_count, 1);
    }

    #[test]
    fn test_feature_children_do_not_contribute() {
        let mut sub_feature = epic("A-1", Status::Done);
        sub_feature.parent_key = Some("A".to_string());
        sub_feature.point = Some(13.0);

        let issues = vec![epic("A", Status::ToDo), sub_feature];

        let rollup = aggregate_epics(&issues, "mvp", &Settings::default());
        let a = find(&rollup, "A");
        assert_eq!(a.total_count, 0);
        assert_eq!(a.total_points, 0.0);
        assert_eq!(a.status, Some(Status::ToDo));
    }

    #[test]
    fn test_missing_points_count_as_zero() {
        let issues = vec![
            epic("A", Status::ToDo),
            child("A-1", "A", None, Status::Done),
            child("A-2", "A", Some(35.0), Status::ToDo),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &Settings::default());
        let a = find(&rollup, "A");
        assert_eq!(a.total_count, 2);
        assert_eq!(a.done_count, 1);
        assert_eq!(a.done_points, 0.0);
        assert_eq!(a.total_points, 35.0);
    }

    #[test]
    fn test_status_promotion() {
        let issues = vec![
            epic("A", Status::ToDo),
            epic("B", Status::Done),
            epic("C", Status::ToDo),
            child("A-1", "A", Some(5.0), Status::Done),
            child("A-2", "A", Some(5.0), Status::ToDo),
            child("B-1", "B", Some(5.0), Status::ToDo),
            child("C-1", "C", Some(5.0), Status::InProgress),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &Settings::default());
        assert_eq!(find(&rollup, "A").status, Some(Status::InProgress));
        assert_eq!(find(&rollup, "B").status, Some(Status::Done));
        assert_eq!(find(&rollup, "C").status, Some(Status::ToDo));
    }

    #[test]
    fn test_derive_status() {
        assert_eq!(derive_status(None, 0), None);
        assert_eq!(derive_status(None, 2), Some(Status::InProgress));
        assert_eq!(
            derive_status(Some(&Status::Done), 0),
            Some(Status::Done)
        );
        let review = Status::Other("In Review".to_string());
        assert_eq!(derive_status(Some(&review), 0), Some(review.clone()));
        assert_eq!(derive_status(Some(&review), 1), Some(Status::InProgress));
    }

    #[test]
    fn test_zero_scope_epics_are_excluded() {
        let settings = Settings {
            points_per_epic: 0,
            ..Settings::default()
        };
        let issues = vec![
            epic("A", Status::ToDo),
            epic("B", Status::ToDo),
            child("B-1", "B", Some(40.0), Status::Done),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &settings);
        assert_eq!(rollup.epics.len(), 1);
        assert_eq!(rollup.epics[0].key, "B");
        assert_eq!(rollup.excluded, vec!["A".to_string()]);
    }

    #[test]
    fn test_done_points_never_exceed_total() {
        let rollup = aggregate_epics(&two_epic_fixture(), "mvp", &Settings::default());
        for epic in &rollup.epics {
            assert!(epic.done_points <= epic.total_points);
            assert!(epic.done_count <= epic.total_count);
        }
    }

    #[test]
    fn test_input_order_does_not_change_summaries() {
        let issues = two_epic_fixture();
        let mut reversed = issues.clone();
        reversed.reverse();

        let forward = aggregate_epics(&issues, "mvp", &Settings::default());
        let backward = aggregate_epics(&reversed, "mvp", &Settings::default());

        let mut a = forward.epics.clone();
        let mut b = backward.epics.clone();
        a.sort_by(|x, y| x.key.cmp(&y.key));
        b.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sorted_by_descending_progress_with_stable_ties() {
        let issues = vec![
            epic("A", Status::ToDo),
            epic("B", Status::ToDo),
            epic("C", Status::ToDo),
            child("B-1", "B", Some(40.0), Status::Done),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &Settings::default());
        let keys: Vec<_> = rollup.epics.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_progress_capped_at_hundred() {
        let settings = Settings {
            points_per_epic: 10,
            ..Settings::default()
        };
        let issues = vec![epic("A", Status::ToDo), child("A-1", "A", Some(20.0), Status::Done)];

        let rollup = aggregate_epics(&issues, "mvp", &settings);
        assert_eq!(rollup.epics[0].progress_percent, 100);
    }

    #[test]
    fn test_over_delivered_epic_ranks_above_complete_one() {
        let settings = Settings {
            points_per_epic: 10,
            ..Settings::default()
        };
        let issues = vec![
            epic("A", Status::ToDo),
            epic("B", Status::ToDo),
            child("A-1", "A", Some(10.0), Status::Done),
            child("B-1", "B", Some(20.0), Status::Done),
        ];

        let rollup = aggregate_epics(&issues, "mvp", &settings);
        let keys: Vec<_> = rollup.epics.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert!(rollup.epics.iter().all(|e| e.progress_percent == 100));
    }

    #[test]
    fn test_duplicate_epic_takes_later_record_keeps_first_position() {
        let mut later = epic("A", Status::Done);
        later.title = Some("Renamed".to_string());

        let issues = vec![
            epic("A", Status::ToDo),
            epic("B", Status::ToDo),
            child("A-1", "A", Some(10.0), Status::ToDo),
            child("B-1", "B", Some(10.0), Status::ToDo),
            later,
        ];

        let rollup = aggregate_epics(&issues, "mvp", &Settings::default());
        let keys: Vec<_> = rollup.epics.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);

        let a = find(&rollup, "A");
        assert_eq!(a.title.as_deref(), Some("Renamed"));
        assert_eq!(a.status, Some(Status::Done));
        // Children are counted once, not per record.
        assert_eq!(a.total_count, 1);
        assert_eq!(a.total_points, 10.0);
    }

    #[test]
    fn test_status_breakdown() {
        let rollup = aggregate_epics(&two_epic_fixture(), "mvp", &Settings::default());
        let breakdown = status_breakdown(&rollup.epics);
        assert_eq!(breakdown.get("In Progress"), Some(&2));
    }

    #[test]
    fn test_largest_remaining() {
        let rollup = aggregate_epics(&two_epic_fixture(), "mvp", &Settings::default());
        let remaining = largest_remaining(&rollup.epics, 5);
        assert_eq!(remaining.len(), 2);
        // Both have 30 points left; ties keep progress order.
        assert_eq!(remaining[0].0.key, "A");
        assert_eq!(remaining[0].1, 30.0);
        assert_eq!(remaining[1].0.key, "B");
    }
}
