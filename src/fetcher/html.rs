//! HTTP fetcher for company report pages.

use super::{parse_report_table, FetchError, ReportFetcher};
use crate::models::{AttributeTable, ReportKind};
use futures::future::BoxFuture;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Settings for the HTML report fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Site root, e.g. `https://www.screener.in`.
    pub base_url: String,
    /// Request consolidated statements instead of standalone ones.
    pub consolidated: bool,
    /// Client-side timeout for a single page request.
    pub request_timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.screener.in".to_string(),
            consolidated: true,
            request_timeout: Duration::from_secs(2),
            user_agent: format!("fundharvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&crate::config::Config> for FetcherConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            base_url: config.fetch.base_url.clone(),
            consolidated: config.fetch.consolidated,
            request_timeout: Duration::from_secs_f64(config.fetch.request_timeout_seconds),
            user_agent: config.fetch.user_agent.clone(),
        }
    }
}

/// Fetches one company page per call and extracts the requested section.
pub struct HtmlReportFetcher {
    client: reqwest::Client,
    base_url: Url,
    consolidated: bool,
}

impl HtmlReportFetcher {
    /// Create a fetcher, validating the base URL up front.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(config.base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url,
            consolidated: config.consolidated,
        })
    }

    /// Page URL holding every report of a company.
    pub fn company_url(&self, subject: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("company").push(subject);
            if self.consolidated {
                segments.push("consolidated");
            }
            // trailing slash
            segments.push("");
        }
        url
    }

    async fn fetch_report(
        &self,
        subject: &str,
        kind: ReportKind,
    ) -> Result<AttributeTable, FetchError> {
        let url = self.company_url(subject);
        debug!(subject, report = %kind, %url, "requesting page");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        parse_report_table(&body, kind)
    }
}

impl ReportFetcher for HtmlReportFetcher {
    fn fetch<'a>(
        &'a self,
        subject: &'a str,
        kind: ReportKind,
    ) -> BoxFuture<'a, Result<AttributeTable, FetchError>> {
        Box::pin(self.fetch_report(subject, kind))
    }
}
