//! Data models for the report harvester.
//!
//! This module contains the identifiers and nested result structures
//! passed between the fetcher, the harvest pools and the output sinks.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A subject identifier (ticker symbol).
pub type Subject = String;

/// Attribute name to ordered values, in source row and column order.
pub type AttributeTable = IndexMap<String, Vec<String>>;

/// Every report attempted for one subject.
pub type SubjectResult = BTreeMap<ReportKind, AttributeTable>;

/// One of the report sections published for a company.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Annual profit and loss statement
    ProfitLoss,
    /// Annual balance sheet
    BalanceSheet,
    /// Annual cash flow statement
    CashFlow,
    /// Quarterly results
    Quarters,
    /// Shareholding pattern
    Shareholding,
    /// Efficiency ratios
    Ratios,
}

impl ReportKind {
    /// Report kinds harvested when none are configured.
    pub const DEFAULT: [ReportKind; 5] = [
        ReportKind::ProfitLoss,
        ReportKind::BalanceSheet,
        ReportKind::CashFlow,
        ReportKind::Quarters,
        ReportKind::Shareholding,
    ];

    /// Kebab-case identifier, also the id of the page section holding the report.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::ProfitLoss => "profit-loss",
            ReportKind::BalanceSheet => "balance-sheet",
            ReportKind::CashFlow => "cash-flow",
            ReportKind::Quarters => "quarters",
            ReportKind::Shareholding => "shareholding",
            ReportKind::Ratios => "ratios",
        }
    }

    /// Human readable title.
    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::ProfitLoss => "Profit & Loss",
            ReportKind::BalanceSheet => "Balance Sheet",
            ReportKind::CashFlow => "Cash Flows",
            ReportKind::Quarters => "Quarterly Results",
            ReportKind::Shareholding => "Shareholding Pattern",
            ReportKind::Ratios => "Ratios",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a subject result holding an empty table for every kind.
pub fn empty_subject_result(kinds: &[ReportKind]) -> SubjectResult {
    kinds
        .iter()
        .map(|&kind| (kind, AttributeTable::new()))
        .collect()
}

/// Final harvest: subject -> report -> attribute -> values.
///
/// Keys are kept sorted so serialized output depends only on the
/// contents, never on the order in which subjects completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aggregate {
    subjects: BTreeMap<Subject, SubjectResult>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a completed subject. Returns the previous result if the
    /// subject was already present.
    pub fn insert(&mut self, subject: Subject, result: SubjectResult) -> Option<SubjectResult> {
        self.subjects.insert(subject, result)
    }

    #[cfg(test)]
    pub fn get(&self, subject: &str) -> Option<&SubjectResult> {
        self.subjects.get(subject)
    }

    /// Look up a single report table.
    #[cfg(test)]
    pub fn table(&self, subject: &str, kind: ReportKind) -> Option<&AttributeTable> {
        self.subjects.get(subject).and_then(|r| r.get(&kind))
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.subjects.contains_key(subject)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Subject, &SubjectResult)> {
        self.subjects.iter()
    }

    /// Iterate over every (subject, kind, table) triple.
    pub fn tables(&self) -> impl Iterator<Item = (&Subject, ReportKind, &AttributeTable)> {
        self.subjects
            .iter()
            .flat_map(|(subject, reports)| {
                reports.iter().map(move |(kind, table)| (subject, *kind, table))
            })
    }
}

/// Metadata about one harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Date and time the run started.
    pub run_date: DateTime<Utc>,
    /// Source the reports were fetched from.
    pub source: String,
    /// Number of subjects requested.
    pub subjects_requested: usize,
    /// Report kinds attempted for every subject.
    pub report_kinds: Vec<ReportKind>,
    /// Tables that came back with at least one attribute.
    pub tables_with_data: usize,
    /// Tables left empty by failure, timeout or missing data.
    pub empty_tables: usize,
    /// Duration of the harvest in seconds.
    pub duration_seconds: f64,
}
