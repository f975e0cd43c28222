//! Per-subject fan-out over report kinds.

use super::{pool_width, report_task};
use crate::fetcher::ReportFetcher;
use crate::models::{AttributeTable, ReportKind, SubjectResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Runs every report kind for one subject and merges the outcomes.
///
/// Cloning is cheap; the orchestrator hands one clone to each subject task.
#[derive(Clone)]
pub struct SubjectWorker {
    fetcher: Arc<dyn ReportFetcher>,
    kinds: Arc<[ReportKind]>,
    deadline: Duration,
    report_slots: usize,
}

impl SubjectWorker {
    /// Create a worker; `report_cap` bounds the inner pool below the kind count.
    pub fn new(
        fetcher: Arc<dyn ReportFetcher>,
        kinds: Arc<[ReportKind]>,
        deadline: Duration,
        report_cap: Option<usize>,
    ) -> Self {
        let report_slots = pool_width(kinds.len(), report_cap);
        Self {
            fetcher,
            kinds,
            deadline,
            report_slots,
        }
    }

    /// Width of the per-subject report pool.
    pub fn report_slots(&self) -> usize {
        self.report_slots
    }

    /// Fetch every report kind for `subject`.
    ///
    /// Waits for all report tasks to settle; a slow or failed report never
    /// cancels its siblings. The result holds one entry per kind.
    pub async fn run(&self, subject: &str) -> SubjectResult {
        let slots = Arc::new(Semaphore::new(self.report_slots));
        let mut tasks = JoinSet::new();

        for &kind in self.kinds.iter() {
            let fetcher = Arc::clone(&self.fetcher);
            let slots = Arc::clone(&slots);
            let subject = subject.to_string();
            let deadline = self.deadline;

            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is dropped.
                let _permit = slots.acquire_owned().await.ok();
                let table = report_task::execute(fetcher.as_ref(), &subject, kind, deadline).await;
                (kind, table)
            });
        }

        let mut settled = Vec::with_capacity(self.kinds.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => settled.push(outcome),
                Err(e) => warn!(subject, error = %e, "report task aborted"),
            }
        }

        merge_reports(subject, &self.kinds, settled)
    }
}

/// Single-writer merge of settled report tasks into a fresh subject result.
///
/// Kinds whose task never delivered an outcome get an empty table.
fn merge_reports(
    subject: &str,
    kinds: &[ReportKind],
    settled: Vec<(ReportKind, AttributeTable)>,
) -> SubjectResult {
    let mut result = SubjectResult::new();
    for (kind, table) in settled {
        result.insert(kind, table);
    }

    for &kind in kinds {
        result.entry(kind).or_insert_with(|| {
            warn!(subject, report = %kind, "no outcome, recording empty table");
            AttributeTable::new()
        });
    }

    let filled = result.values().filter(|t| !t.is_empty()).count();
    debug!(subject, filled, total = result.len(), "reports merged");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::testing::{attr_table, Behavior, StubFetcher};
    use std::time::Instant;

    const KINDS: [ReportKind; 3] = [
        ReportKind::ProfitLoss,
        ReportKind::BalanceSheet,
        ReportKind::CashFlow,
    ];

    fn worker(stub: Arc<StubFetcher>, deadline: Duration, cap: Option<usize>) -> SubjectWorker {
        SubjectWorker::new(stub, Arc::from(&KINDS[..]), deadline, cap)
    }

    #[tokio::test]
    async fn test_every_kind_present() {
        let stub = Arc::new(StubFetcher::returning_attr1());
        let result = worker(stub, Duration::from_secs(2), None).run("TCS").await;

        assert_eq!(result.len(), KINDS.len());
        for kind in KINDS {
            assert_eq!(result[&kind], attr_table(&[("attr1", &["1", "2"])]));
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_kind() {
        let stub = Arc::new(
            StubFetcher::returning_attr1().with("TCS", ReportKind::BalanceSheet, Behavior::Fail),
        );
        let result = worker(stub, Duration::from_secs(2), None).run("TCS").await;

        assert!(result[&ReportKind::BalanceSheet].is_empty());
        assert!(!result[&ReportKind::ProfitLoss].is_empty());
        assert!(!result[&ReportKind::CashFlow].is_empty());
    }

    #[tokio::test]
    async fn test_all_failed_is_still_complete() {
        let stub = Arc::new(StubFetcher::new(Behavior::Fail));
        let result = worker(stub, Duration::from_secs(2), None).run("TCS").await;

        assert_eq!(result.len(), KINDS.len());
        assert!(result.values().all(|t| t.is_empty()));
    }

    #[tokio::test]
    async fn test_panicking_task_leaves_empty_entry() {
        let stub = Arc::new(
            StubFetcher::returning_attr1().with("TCS", ReportKind::CashFlow, Behavior::Panic),
        );
        let result = worker(stub, Duration::from_secs(2), None).run("TCS").await;

        assert_eq!(result.len(), KINDS.len());
        assert!(result[&ReportKind::CashFlow].is_empty());
        assert!(!result[&ReportKind::ProfitLoss].is_empty());
    }

    #[tokio::test]
    async fn test_slow_report_does_not_cancel_siblings() {
        let stub = Arc::new(StubFetcher::returning_attr1().with(
            "TCS",
            ReportKind::ProfitLoss,
            Behavior::Sleep(Duration::from_secs(30)),
        ));
        let started = Instant::now();
        let result = worker(stub.clone(), Duration::from_millis(200), None)
            .run("TCS")
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(result[&ReportKind::ProfitLoss].is_empty());
        assert!(!result[&ReportKind::BalanceSheet].is_empty());
        assert!(!result[&ReportKind::CashFlow].is_empty());
        assert_eq!(stub.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_inner_pool_runs_all_kinds_at_once() {
        let stub = Arc::new(StubFetcher::returning_attr1().with_latency(Duration::from_millis(50)));
        let w = worker(stub.clone(), Duration::from_secs(2), None);
        assert_eq!(w.report_slots(), KINDS.len());

        w.run("TCS").await;
        assert_eq!(stub.calls(), KINDS.len());
        assert_eq!(stub.peak(), KINDS.len());
    }

    #[tokio::test]
    async fn test_report_cap_bounds_inner_pool() {
        let stub = Arc::new(StubFetcher::returning_attr1().with_latency(Duration::from_millis(30)));
        let w = worker(stub.clone(), Duration::from_secs(2), Some(1));
        assert_eq!(w.report_slots(), 1);

        let result = w.run("TCS").await;
        assert_eq!(result.len(), KINDS.len());
        assert_eq!(stub.peak(), 1);
    }

    #[tokio::test]
    async fn test_no_kinds_yields_empty_result() {
        let stub = Arc::new(StubFetcher::returning_attr1());
        let w = SubjectWorker::new(
            stub.clone(),
            Arc::from(Vec::<ReportKind>::new()),
            Duration::from_secs(2),
            None,
        );

        let result = w.run("TCS").await;
        assert!(result.is_empty());
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn test_merge_fills_missing_kinds() {
        let settled = vec![(ReportKind::ProfitLoss, attr_table(&[("Sales", &["1"])]))];
        let result = merge_reports("TCS", &KINDS, settled);

        assert_eq!(result.len(), 3);
        assert_eq!(result[&ReportKind::ProfitLoss]["Sales"], vec!["1"]);
        assert!(result[&ReportKind::CashFlow].is_empty());
    }
}
