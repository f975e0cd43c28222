//! Harvest statistics.
//!
//! This module provides utilities for summarizing a finished aggregate:
//! which tables came back with data and which were left empty.

use crate::models::{Aggregate, ReportKind, Subject};
use serde::Serialize;
use std::collections::BTreeMap;

/// Table counts for a finished harvest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    /// Number of subjects in the aggregate.
    pub subjects: usize,
    /// Total number of (subject, report) tables.
    pub total_tables: usize,
    /// Tables with at least one attribute.
    pub tables_with_data: usize,
    /// Tables left empty.
    pub empty_tables: usize,
    /// Subjects for which every table is empty.
    pub subjects_without_data: usize,
    /// Subjects with data, per report kind.
    pub coverage: BTreeMap<ReportKind, usize>,
}

impl HarvestSummary {
    /// Summarize an aggregate.
    pub fn from_aggregate(aggregate: &Aggregate) -> Self {
        let mut summary = Self {
            subjects: aggregate.len(),
            subjects_without_data: subjects_without_data(aggregate).len(),
            ..Self::default()
        };

        for (_, kind, table) in aggregate.tables() {
            summary.total_tables += 1;
            let covered = summary.coverage.entry(kind).or_insert(0);
            if table.is_empty() {
                summary.empty_tables += 1;
            } else {
                summary.tables_with_data += 1;
                *covered += 1;
            }
        }

        summary
    }
}

/// Every (subject, report) pair whose table is empty, in sorted order.
pub fn empty_pairs(aggregate: &Aggregate) -> Vec<(Subject, ReportKind)> {
    aggregate
        .tables()
        .filter(|(_, _, table)| table.is_empty())
        .map(|(subject, kind, _)| (subject.clone(), kind))
        .collect()
}

/// Subjects for which no report produced any data.
pub fn subjects_without_data(aggregate: &Aggregate) -> Vec<&Subject> {
    aggregate
        .iter()
        .filter(|(_, reports)| reports.values().all(|t| t.is_empty()))
        .map(|(subject, _)| subject)
        .collect()
}

/// Generate a text summary of harvest statistics.
pub fn generate_summary_text(summary: &HarvestSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Subjects: {}", summary.subjects));
    lines.push(format!(
        "Tables: {} ({} with data, {} empty)",
        summary.total_tables, summary.tables_with_data, summary.empty_tables
    ));
    if summary.subjects_without_data > 0 {
        lines.push(format!(
            "Subjects without any data: {}",
            summary.subjects_without_data
        ));
    }

    if !summary.coverage.is_empty() {
        lines.push(String::new());
        lines.push("Coverage by report:".to_string());
        for (kind, count) in &summary.coverage {
            lines.push(format!("- {}: {}/{}", kind, count, summary.subjects));
        }
    }

    lines.join("\n")
}
