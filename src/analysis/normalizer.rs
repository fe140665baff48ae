//! Raw export normalization.
//!
//! Converts one page of a tracker export into canonical [`Issue`] values.
//! Every nested field is optional: a missing or mistyped field degrades to
//! an absent value instead of rejecting the entry or the page.

use crate::models::{Issue, IssueType, Status};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Tracker field holding story points.
pub const STORY_POINTS_FIELD: &str = "customfield_10016";

/// Issue type name the tracker uses for features.
pub const DEFAULT_FEATURE_TYPE: &str = "FEAT";

/// Maps raw export entries to [`Issue`] values.
#[derive(Debug, Clone)]
pub struct Normalizer {
    feature_type: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_FEATURE_TYPE)
    }
}

impl Normalizer {
    /// Create a normalizer that treats `feature_type` as the feature issue type.
    pub fn new(feature_type: impl Into<String>) -> Self {
        Self {
            feature_type: feature_type.into(),
        }
    }

    /// Normalize a page. Returns `None` when the page has no `issues` array.
    pub fn normalize_page(&self, page: &Value) -> Option<Vec<Issue>> {
        let entries = page.get("issues")?.as_array()?;
        let issues: Vec<Issue> = entries.iter().map(|e| self.normalize_issue(e)).collect();
        debug!("Normalized {} issues from page", issues.len());
        Some(issues)
    }

    /// Normalize a single raw entry.
    pub fn normalize_issue(&self, raw: &Value) -> Issue {
        let fields = &raw["fields"];

        let key = raw["key"].as_str().unwrap_or_default().to_string();
        if key.is_empty() {
            debug!("Export entry without a key");
        }

        let issue_type = match fields["issuetype"]["name"].as_str() {
            Some(name) if name == self.feature_type => IssueType::Feature,
            Some(name) => IssueType::Other(name.to_string()),
            None => IssueType::Other(String::new()),
        };

        let labels: BTreeSet<String> = fields["labels"]
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let point = fields[STORY_POINTS_FIELD]
            .as_f64()
            .filter(|p| p.is_finite() && *p >= 0.0);

        Issue {
            key,
            issue_type,
            title: fields["summary"].as_str().map(String::from),
            labels,
            point,
            status: fields["status"]["name"].as_str().map(Status::from),
            parent_key: fields["parent"]["key"].as_str().map(String::from),
        }
    }
}
