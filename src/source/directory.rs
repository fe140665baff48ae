//! Export pages stored as files in a local directory.

use super::{FetchError, PageFetch, PageSource};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Reads `<dir>/<pattern>` with `{}` replaced by the page number.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    pattern: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    /// Path of a given page.
    pub fn page_path(&self, page: usize) -> PathBuf {
        self.dir
            .join(self.pattern.replace("{}", &page.to_string()))
    }
}

impl PageSource for DirectorySource {
    async fn fetch_page(&self, page: usize) -> Result<PageFetch, FetchError> {
        let path = self.page_path(page);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist", path.display());
                return Ok(PageFetch::End);
            }
            Err(source) => return Err(FetchError::Io { path, source }),
        };

        let value = serde_json::from_str(&content).map_err(|source| FetchError::Json {
            location: path.display().to_string(),
            source,
        })?;

        Ok(PageFetch::Page(value))
    }

    fn describe(&self) -> String {
        self.dir.join(&self.pattern).display().to_string()
    }
}
