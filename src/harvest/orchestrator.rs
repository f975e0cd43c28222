//! Cross-subject fan-out and aggregate assembly.

use super::{pool_width, HarvestConfig, SubjectWorker};
use crate::fetcher::ReportFetcher;
use crate::models::{empty_subject_result, Aggregate, ReportKind, Subject};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs one [`SubjectWorker`] per subject and assembles the [`Aggregate`].
pub struct Orchestrator {
    fetcher: Arc<dyn ReportFetcher>,
    config: HarvestConfig,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn ReportFetcher>, config: HarvestConfig) -> Self {
        Self { fetcher, config }
    }

    /// Harvest every kind for every subject.
    ///
    /// Results are inserted in completion order. Every subject ends up in
    /// the aggregate exactly once, and every spawned task has been joined
    /// by the time this returns.
    pub async fn run(&self, subjects: &[Subject], kinds: &[ReportKind]) -> Aggregate {
        let worker = SubjectWorker::new(
            Arc::clone(&self.fetcher),
            Arc::from(kinds),
            self.config.task_timeout,
            self.config.report_concurrency,
        );
        let subject_slots = pool_width(subjects.len(), self.config.subject_concurrency);

        info!(
            subjects = subjects.len(),
            reports = kinds.len(),
            subject_slots,
            report_slots = worker.report_slots(),
            deadline = ?self.config.task_timeout,
            "starting harvest"
        );

        let slots = Arc::new(Semaphore::new(subject_slots));
        let mut workers = JoinSet::new();

        for subject in subjects {
            let worker = worker.clone();
            let slots = Arc::clone(&slots);
            let subject = subject.clone();

            workers.spawn(async move {
                let _permit = slots.acquire_owned().await.ok();
                let result = worker.run(&subject).await;
                (subject, result)
            });
        }

        let progress = self.progress_bar(subjects.len());
        let mut aggregate = Aggregate::new();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((subject, result)) => {
                    debug!(subject = %subject, "collected");
                    if let Some(pb) = &progress {
                        pb.set_message(subject.clone());
                        pb.inc(1);
                    }
                    aggregate.insert(subject, result);
                }
                Err(e) => warn!(error = %e, "subject worker aborted"),
            }
        }

        for subject in subjects {
            if !aggregate.contains(subject) {
                warn!(subject = %subject, "no result, recording empty reports");
                aggregate.insert(subject.clone(), empty_subject_result(kinds));
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        aggregate
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.config.show_progress || len == 0 {
            return None;
        }

        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::testing::{attr_table, Behavior, StubFetcher};
    use crate::models::AttributeTable;
    use std::time::{Duration, Instant};

    fn subjects(names: &[&str]) -> Vec<Subject> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn orchestrator(stub: Arc<StubFetcher>, config: HarvestConfig) -> Orchestrator {
        Orchestrator::new(stub, config)
    }

    fn deadline(ms: u64) -> HarvestConfig {
        HarvestConfig {
            task_timeout: Duration::from_millis(ms),
            ..HarvestConfig::default()
        }
    }

    #[tokio::test]
    async fn test_timed_out_pair_is_empty_and_others_complete() {
        let x = ReportKind::ProfitLoss;
        let y = ReportKind::BalanceSheet;
        let stub = Arc::new(
            StubFetcher::returning_attr1().with("B", y, Behavior::Sleep(Duration::from_secs(30))),
        );

        let aggregate = orchestrator(stub, deadline(200))
            .run(&subjects(&["A", "B"]), &[x, y])
            .await;

        let attr1 = attr_table(&[("attr1", &["1", "2"])]);
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.table("A", x), Some(&attr1));
        assert_eq!(aggregate.table("A", y), Some(&attr1));
        assert_eq!(aggregate.table("B", x), Some(&attr1));
        assert_eq!(aggregate.table("B", y), Some(&AttributeTable::new()));
    }

    #[tokio::test]
    async fn test_completeness_under_failures() {
        let stub = Arc::new(
            StubFetcher::returning_attr1()
                .with("A", ReportKind::CashFlow, Behavior::Fail)
                .with("B", ReportKind::Quarters, Behavior::Panic)
                .with("C", ReportKind::ProfitLoss, Behavior::Sleep(Duration::from_secs(30))),
        );
        let names = subjects(&["A", "B", "C", "D"]);

        let aggregate = orchestrator(stub, deadline(200))
            .run(&names, &ReportKind::DEFAULT)
            .await;

        assert_eq!(aggregate.len(), names.len());
        for name in &names {
            let result = aggregate.get(name).unwrap();
            assert_eq!(result.len(), ReportKind::DEFAULT.len());
        }
        let empty: Vec<_> = aggregate
            .tables()
            .filter(|(_, _, t)| t.is_empty())
            .map(|(s, k, _)| (s.clone(), k))
            .collect();
        assert_eq!(
            empty,
            vec![
                ("A".to_string(), ReportKind::CashFlow),
                ("B".to_string(), ReportKind::Quarters),
                ("C".to_string(), ReportKind::ProfitLoss),
            ]
        );
    }

    #[tokio::test]
    async fn test_runs_are_repeatable() {
        let stub = Arc::new(
            StubFetcher::returning_attr1()
                .with("B", ReportKind::Shareholding, Behavior::Fail)
                .with_latency(Duration::from_millis(5)),
        );
        let orch = orchestrator(stub, deadline(1000));
        let names = subjects(&["C", "A", "B"]);

        let first = orch.run(&names, &ReportKind::DEFAULT).await;
        let second = orch.run(&names, &ReportKind::DEFAULT).await;

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_timeout_bounds_wall_clock() {
        let stub = Arc::new(StubFetcher::new(Behavior::Sleep(Duration::from_secs(30))));
        let names = subjects(&["A", "B", "C"]);

        let started = Instant::now();
        let aggregate = orchestrator(stub, deadline(200))
            .run(&names, &ReportKind::DEFAULT)
            .await;

        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(aggregate.tables().all(|(_, _, t)| t.is_empty()));
    }

    #[tokio::test]
    async fn test_no_fetch_outlives_run() {
        let stub = Arc::new(
            StubFetcher::returning_attr1()
                .with_latency(Duration::from_millis(10))
                .with("A", ReportKind::Quarters, Behavior::Sleep(Duration::from_secs(30)))
                .with("B", ReportKind::CashFlow, Behavior::Sleep(Duration::from_secs(30))),
        );

        let orch = orchestrator(stub.clone(), deadline(100));
        orch.run(&subjects(&["A", "B", "C"]), &ReportKind::DEFAULT)
            .await;

        assert_eq!(stub.in_flight(), 0);
        assert_eq!(stub.calls(), 3 * ReportKind::DEFAULT.len());
        // Only the orchestrator's own handle remains.
        assert_eq!(Arc::strong_count(&stub), 2);
    }

    #[tokio::test]
    async fn test_subject_cap_bounds_outer_pool() {
        let stub = Arc::new(StubFetcher::returning_attr1().with_latency(Duration::from_millis(30)));
        let config = HarvestConfig {
            subject_concurrency: Some(1),
            report_concurrency: Some(1),
            ..HarvestConfig::default()
        };

        let aggregate = orchestrator(stub.clone(), config)
            .run(&subjects(&["A", "B", "C"]), &[ReportKind::ProfitLoss, ReportKind::Ratios])
            .await;

        assert_eq!(aggregate.len(), 3);
        assert_eq!(stub.peak(), 1);
    }

    #[tokio::test]
    async fn test_uncapped_pools_fan_out_fully() {
        let stub = Arc::new(StubFetcher::returning_attr1().with_latency(Duration::from_millis(50)));

        orchestrator(stub.clone(), HarvestConfig::default())
            .run(&subjects(&["A", "B"]), &[ReportKind::ProfitLoss, ReportKind::CashFlow])
            .await;

        assert_eq!(stub.peak(), 4);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let stub = Arc::new(StubFetcher::returning_attr1());
        let orch = orchestrator(stub.clone(), HarvestConfig::default());

        assert!(orch.run(&[], &ReportKind::DEFAULT).await.is_empty());

        let aggregate = orch.run(&subjects(&["A"]), &[]).await;
        assert_eq!(aggregate.len(), 1);
        assert!(aggregate.get("A").unwrap().is_empty());
        assert_eq!(stub.calls(), 0);
    }
}
