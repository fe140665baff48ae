//! Export pages served over HTTP.

use super::{FetchError, PageFetch, PageSource};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// GETs `<base-url>/<pattern>` with `{}` replaced by the page number.
///
/// A 404 ends the export. Any other failure is a [`FetchError`], so an
/// outage is never mistaken for a short export.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    pattern: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str, pattern: &str, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            pattern: pattern.to_string(),
            client,
        })
    }

    /// URL of a given page.
    pub fn page_url(&self, page: usize) -> String {
        format!(
            "{}/{}",
            self.base_url,
            self.pattern.replace("{}", &page.to_string())
        )
    }
}

impl PageSource for HttpSource {
    async fn fetch_page(&self, page: usize) -> Result<PageFetch, FetchError> {
        let url = self.page_url(page);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(PageFetch::End);
        }
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = response.text().await.map_err(|source| FetchError::Request {
            url: url.clone(),
            source,
        })?;

        let value = serde_json::from_str(&body).map_err(|source| FetchError::Json {
            location: url.clone(),
            source,
        })?;

        Ok(PageFetch::Page(value))
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.base_url, self.pattern)
    }
}
