//! Stub fetchers shared by the harvest tests.

use crate::fetcher::{FetchError, ReportFetcher};
use crate::models::{AttributeTable, ReportKind};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the stub answers one (subject, kind) pair.
#[derive(Debug, Clone)]
pub enum Behavior {
    Table(AttributeTable),
    Fail,
    Sleep(Duration),
    Panic,
}

pub fn attr_table(pairs: &[(&str, &[&str])]) -> AttributeTable {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

/// Deterministic fetcher with per-pair overrides and in-flight accounting.
pub struct StubFetcher {
    default: Behavior,
    overrides: HashMap<(String, ReportKind), Behavior>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers every pair with `{"attr1": ["1", "2"]}`.
    pub fn returning_attr1() -> Self {
        Self::new(Behavior::Table(attr_table(&[("attr1", &["1", "2"])])))
    }

    pub fn with(mut self, subject: &str, kind: ReportKind, behavior: Behavior) -> Self {
        self.overrides.insert((subject.to_string(), kind), behavior);
        self
    }

    /// Delay applied before every successful answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fetches currently running (not yet finished or dropped).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a StubFetcher);

impl<'a> InFlight<'a> {
    fn enter(stub: &'a StubFetcher) -> Self {
        stub.calls.fetch_add(1, Ordering::SeqCst);
        let now = stub.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stub.peak.fetch_max(now, Ordering::SeqCst);
        Self(stub)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReportFetcher for StubFetcher {
    fn fetch<'a>(
        &'a self,
        subject: &'a str,
        kind: ReportKind,
    ) -> BoxFuture<'a, Result<AttributeTable, FetchError>> {
        let behavior = self
            .overrides
            .get(&(subject.to_string(), kind))
            .unwrap_or(&self.default)
            .clone();

        Box::pin(async move {
            let _guard = InFlight::enter(self);
            match behavior {
                Behavior::Table(table) => {
                    tokio::time::sleep(self.latency).await;
                    Ok(table)
                }
                Behavior::Fail => Err(FetchError::Parse(format!("stub failure for {}", subject))),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(AttributeTable::new())
                }
                Behavior::Panic => panic!("stub fetcher panicked for {} {}", subject, kind),
            }
        })
    }
}
