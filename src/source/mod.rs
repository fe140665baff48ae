//! Export page retrieval.
//!
//! Tracker exports come as numbered JSON pages (`data1.json`,
//! `data2.json`, ...). A [`PageSource`] fetches one page at a time and
//! [`collect_issues`] walks the pages in order until the source runs dry.

pub mod directory;
pub mod http;

pub use directory::DirectorySource;
pub use http::HttpSource;

use crate::analysis::Normalizer;
use crate::models::{Issue, Termination};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default page file name; `{}` is replaced by the page number.
pub const DEFAULT_PAGE_PATTERN: &str = "data{}.json";

/// Upper bound on pages read in one refresh.
pub const DEFAULT_MAX_PAGES: usize = 500;

/// Outcome of fetching a single page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetch {
    /// The page exists; its parsed JSON body.
    Page(Value),
    /// There is no such page: the export ends before it.
    End,
}

/// A page exists (or may exist) but could not be read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Something that can hand out numbered export pages.
pub trait PageSource {
    /// Fetch page `page` (1-based).
    fn fetch_page(&self, page: usize)
        -> impl Future<Output = Result<PageFetch, FetchError>> + Send;

    /// Human-readable location, for logs and report metadata.
    fn describe(&self) -> String;
}

/// The concrete sources the CLI can read from.
#[derive(Debug)]
pub enum ExportSource {
    Directory(DirectorySource),
    Http(HttpSource),
}

impl PageSource for ExportSource {
    async fn fetch_page(&self, page: usize) -> Result<PageFetch, FetchError> {
        match self {
            ExportSource::Directory(source) => source.fetch_page(page).await,
            ExportSource::Http(source) => source.fetch_page(page).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            ExportSource::Directory(source) => source.describe(),
            ExportSource::Http(source) => source.describe(),
        }
    }
}

/// Options for walking the pages of an export.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Stop after this many pages even if more exist.
    pub max_pages: usize,
    /// Whether to show a spinner.
    pub show_progress: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            show_progress: true,
        }
    }
}

/// Issues gathered from an export, and how retrieval ended.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub issues: Vec<Issue>,
    pub pages_read: usize,
    pub termination: Termination,
}

/// Read pages 1, 2, 3, ... in order and normalize their issues.
///
/// Never fails: a missing page, a page without an issues collection, or a
/// fetch error all end retrieval, keeping everything gathered so far. The
/// reason is recorded in [`Harvest::termination`].
pub async fn collect_issues<S: PageSource>(
    source: &S,
    normalizer: &Normalizer,
    options: &CollectOptions,
) -> Harvest {
    info!("Reading export pages from {}", source.describe());

    let spinner = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut issues = Vec::new();
    let mut pages_read = 0;
    let mut page = 1;

    let termination = loop {
        if page > options.max_pages {
            warn!(
                "Stopped after {} pages; raise max_pages if the export is larger",
                options.max_pages
            );
            break Termination::PageLimit;
        }

        spinner.set_message(format!("Reading page {}...", page));

        match source.fetch_page(page).await {
            Ok(PageFetch::Page(raw)) => match normalizer.normalize_page(&raw) {
                Some(page_issues) => {
                    debug!("Page {}: {} issues", page, page_issues.len());
                    issues.extend(page_issues);
                    pages_read += 1;
                }
                None => {
                    warn!("Page {} has no issues collection; stopping", page);
                    break Termination::Malformed { page };
                }
            },
            Ok(PageFetch::End) => {
                debug!("No page {}; export exhausted", page);
                break Termination::Exhausted;
            }
            Err(e) => {
                warn!(
                    "Could not read page {} ({}); treating it as the end of the export",
                    page, e
                );
                break Termination::Failed {
                    page,
                    reason: e.to_string(),
                };
            }
        }

        page += 1;
    };

    spinner.finish_and_clear();

    info!("Read {} issues from {} pages", issues.len(), pages_read);

    Harvest {
        issues,
        pages_read,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    /// What a scripted page returns.
    enum Scripted {
        Page(Value),
        Fail,
    }

    /// Serves a fixed list of pages; anything past the list is the end.
    struct ScriptedSource {
        pages: Vec<Scripted>,
    }

    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, page: usize) -> Result<PageFetch, FetchError> {
            match self.pages.get(page - 1) {
                Some(Scripted::Page(value)) => Ok(PageFetch::Page(value.clone())),
                Some(Scripted::Fail) => Err(FetchError::Io {
                    path: PathBuf::from(format!("data{}.json", page)),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "connection reset"),
                }),
                None => Ok(PageFetch::End),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn page_of(keys: &[&str]) -> Value {
        let issues: Vec<Value> = keys
            .iter()
            .map(|k| json!({ "key": k, "fields": { "customfield_10016": 3 } }))
            .collect();
        json!({ "issues": issues })
    }

    fn quiet() -> CollectOptions {
        CollectOptions {
            show_progress: false,
            ..CollectOptions::default()
        }
    }

    fn keys(harvest: &Harvest) -> Vec<&str> {
        harvest.issues.iter().map(|i| i.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_reads_until_end() {
        let source = ScriptedSource {
            pages: vec![
                Scripted::Page(page_of(&["A-1", "A-2"])),
                Scripted::Page(page_of(&["A-3"])),
            ],
        };

        let harvest = collect_issues(&source, &Normalizer::default(), &quiet()).await;
        assert_eq!(keys(&harvest), vec!["A-1", "A-2", "A-3"]);
        assert_eq!(harvest.pages_read, 2);
        assert_eq!(harvest.termination, Termination::Exhausted);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_pages() {
        let source = ScriptedSource {
            pages: vec![
                Scripted::Page(page_of(&["A-1"])),
                Scripted::Page(page_of(&["A-2"])),
                Scripted::Fail,
                Scripted::Page(page_of(&["A-4"])),
            ],
        };

        let harvest = collect_issues(&source, &Normalizer::default(), &quiet()).await;
        assert_eq!(keys(&harvest), vec!["A-1", "A-2"]);
        assert_eq!(harvest.pages_read, 2);
        match &harvest.termination {
            Termination::Failed { page, reason } => {
                assert_eq!(*page, 3);
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected termination: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_page_stops_retrieval() {
        let source = ScriptedSource {
            pages: vec![
                Scripted::Page(page_of(&["A-1"])),
                Scripted::Page(json!({ "errorMessages": ["gone"] })),
                Scripted::Page(page_of(&["A-3"])),
            ],
        };

        let harvest = collect_issues(&source, &Normalizer::default(), &quiet()).await;
        assert_eq!(keys(&harvest), vec!["A-1"]);
        assert_eq!(harvest.termination, Termination::Malformed { page: 2 });
    }

    #[tokio::test]
    async fn test_page_limit() {
        let source = ScriptedSource {
            pages: vec![
                Scripted::Page(page_of(&["A-1"])),
                Scripted::Page(page_of(&["A-2"])),
                Scripted::Page(page_of(&["A-3"])),
            ],
        };
        let options = CollectOptions {
            max_pages: 2,
            ..quiet()
        };

        let harvest = collect_issues(&source, &Normalizer::default(), &options).await;
        assert_eq!(keys(&harvest), vec!["A-1", "A-2"]);
        assert_eq!(harvest.termination, Termination::PageLimit);
    }

    #[test]
    fn test_default_options() {
        let options = CollectOptions::default();
        assert_eq!(options.max_pages, DEFAULT_MAX_PAGES);
        assert!(options.show_progress);
    }

    #[tokio::test]
    async fn test_empty_export() {
        let source = ScriptedSource { pages: vec![] };

        let harvest = collect_issues(&source, &Normalizer::default(), &quiet()).await;
        assert!(harvest.issues.is_empty());
        assert_eq!(harvest.pages_read, 0);
        assert_eq!(harvest.termination, Termination::Exhausted);
    }

    #[tokio::test]
    async fn test_fixture_export() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let source = ExportSource::Directory(DirectorySource::new(dir, DEFAULT_PAGE_PATTERN));

        let harvest = collect_issues(&source, &Normalizer::default(), &quiet()).await;
        assert_eq!(harvest.pages_read, 2);
        assert_eq!(harvest.termination, Termination::Exhausted);
        assert_eq!(harvest.issues.len(), 9);
    }
}
