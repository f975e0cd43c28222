//! Report fetchers.
//!
//! A fetcher turns one (subject, report kind) pair into an attribute
//! table. Fetchers are shared between every concurrent report task, so
//! implementations must be reentrant and hold no per-call mutable state.

pub mod html;
pub mod parse;

pub use html::{FetcherConfig, HtmlReportFetcher};
pub use parse::{parse_report_table, PERIOD_ATTRIBUTE};

use crate::models::{AttributeTable, ReportKind};
use futures::future::BoxFuture;
use thiserror::Error;

/// Why a single report could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport level failure, including the client's own timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured site root cannot be used to build page URLs.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// The page answered with a non-success status.
    #[error("unexpected response status {status} at {url}")]
    Status { status: u16, url: String },

    /// The page has no section for the requested report.
    #[error("section `{0}` not found on page")]
    SectionNotFound(ReportKind),

    /// The report section is present but its table is malformed.
    #[error("malformed report table: {0}")]
    Parse(String),
}

/// Source of report tables.
pub trait ReportFetcher: Send + Sync {
    /// Fetch one report for one subject.
    fn fetch<'a>(
        &'a self,
        subject: &'a str,
        kind: ReportKind,
    ) -> BoxFuture<'a, Result<AttributeTable, FetchError>>;
}
