//! A single deadline-bounded report fetch.
//!
//! The task runs the fetcher under a deadline and settles to a table no
//! matter what happened. Timeouts and failures are reported through
//! diagnostics only; callers always receive an [`AttributeTable`].

use crate::fetcher::{FetchError, ReportFetcher};
use crate::models::{AttributeTable, ReportKind};
use std::time::Duration;
use tracing::{debug, warn};

/// Terminal state of a report task.
#[derive(Debug)]
pub enum Settlement {
    Succeeded(AttributeTable),
    TimedOut,
    Failed(FetchError),
}

impl Settlement {
    /// Collapse into the table handed upward, logging timeouts and failures.
    pub fn into_table(self, subject: &str, kind: ReportKind) -> AttributeTable {
        match self {
            Settlement::Succeeded(table) => table,
            Settlement::TimedOut => {
                warn!(subject, report = %kind, "timeout");
                AttributeTable::new()
            }
            Settlement::Failed(e) => {
                warn!(subject, report = %kind, error = %e, "fetch failed");
                AttributeTable::new()
            }
        }
    }
}

/// Run the fetch under `deadline` and report how it ended.
///
/// On timeout the fetch future is dropped, which cancels it.
pub async fn run(
    fetcher: &dyn ReportFetcher,
    subject: &str,
    kind: ReportKind,
    deadline: Duration,
) -> Settlement {
    debug!(subject, report = %kind, "fetching");

    match tokio::time::timeout(deadline, fetcher.fetch(subject, kind)).await {
        Ok(Ok(table)) => {
            debug!(subject, report = %kind, attributes = table.len(), "fetched");
            Settlement::Succeeded(table)
        }
        Ok(Err(e)) => Settlement::Failed(e),
        Err(_) => Settlement::TimedOut,
    }
}

/// Fetch one report, settling every outcome to a table.
pub async fn execute(
    fetcher: &dyn ReportFetcher,
    subject: &str,
    kind: ReportKind,
    deadline: Duration,
) -> AttributeTable {
    run(fetcher, subject, kind, deadline)
        .await
        .into_table(subject, kind)
}
