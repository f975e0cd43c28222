//! Report generation.
//!
//! This module renders a finished harvest as pretty JSON (the nested
//! subject -> report -> attribute -> values map) or as a Markdown
//! document with one table per subject and report.

use super::SinkError;
use crate::analysis::{empty_pairs, HarvestSummary};
use crate::fetcher::PERIOD_ATTRIBUTE;
use crate::models::{Aggregate, AttributeTable, ReportKind, RunMetadata, SubjectResult};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(aggregate: &Aggregate, metadata: &RunMetadata) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# fundharvest Report\n\n");

    output.push_str(&generate_metadata_section(metadata));
    output.push_str(&generate_table_of_contents(aggregate));
    output.push_str(&generate_summary_section(aggregate));

    if aggregate.is_empty() {
        output.push_str("_No subjects harvested._\n\n");
    }
    for (subject, reports) in aggregate.iter() {
        output.push_str(&generate_subject_section(subject, reports));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Subjects Requested:** {}\n",
        metadata.subjects_requested
    ));
    let kinds: Vec<_> = metadata.report_kinds.iter().map(|k| k.as_str()).collect();
    section.push_str(&format!("- **Reports:** {}\n", kinds.join(", ")));
    section.push_str(&format!(
        "- **Tables With Data:** {}\n",
        metadata.tables_with_data
    ));
    if metadata.empty_tables > 0 {
        section.push_str(&format!("- **Empty Tables:** {}\n", metadata.empty_tables));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(aggregate: &Aggregate) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");

    for (subject, _) in aggregate.iter() {
        toc.push_str(&format!("- [{}](#{})\n", subject, anchor(subject)));
    }
    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(aggregate: &Aggregate) -> String {
    let summary = HarvestSummary::from_aggregate(aggregate);
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Subjects | Tables | With Data | Empty |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        summary.subjects, summary.total_tables, summary.tables_with_data, summary.empty_tables
    ));

    if !summary.coverage.is_empty() {
        section.push_str("### Coverage by Report\n\n");
        section.push_str("| Report | Subjects With Data |\n");
        section.push_str("|:---|:---:|\n");
        for (kind, count) in &summary.coverage {
            section.push_str(&format!("| {} | {}/{} |\n", kind.title(), count, summary.subjects));
        }
        section.push('\n');
    }

    let gaps = empty_pairs(aggregate);
    if !gaps.is_empty() {
        section.push_str("### Empty Tables\n\n");
        for (subject, kind) in gaps {
            section.push_str(&format!("- `{}` {}\n", subject, kind));
        }
        section.push('\n');
    }

    section
}

/// Generate the section for one subject.
fn generate_subject_section(subject: &str, reports: &SubjectResult) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {} {{#{}}}\n\n", subject, anchor(subject)));

    for (kind, table) in reports {
        section.push_str(&generate_report_block(*kind, table));
    }

    section
}

/// Generate a single report table.
fn generate_report_block(kind: ReportKind, table: &AttributeTable) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", kind.title()));

    if table.is_empty() {
        block.push_str("_No data_\n\n");
        return block;
    }

    let width = table.values().map(Vec::len).max().unwrap_or(0);
    let header: Vec<String> = match table.get(PERIOD_ATTRIBUTE) {
        Some(periods) => periods.iter().map(|p| escape_cell(p)).collect(),
        None => (1..=width).map(|i| i.to_string()).collect(),
    };
    let columns = header.len().max(width);

    block.push_str("| Attribute |");
    for i in 0..columns {
        block.push_str(&format!(" {} |", header.get(i).map(String::as_str).unwrap_or("")));
    }
    block.push('\n');
    block.push_str("|:---|");
    block.push_str(&"---:|".repeat(columns));
    block.push('\n');

    for (name, values) in table {
        if name == PERIOD_ATTRIBUTE {
            continue;
        }
        block.push_str(&format!("| {} |", escape_cell(name)));
        for i in 0..columns {
            let value = values.get(i).map(|v| escape_cell(v)).unwrap_or_default();
            block.push_str(&format!(" {} |", value));
        }
        block.push('\n');
    }
    block.push('\n');

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by fundharvest v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn anchor(subject: &str) -> String {
    subject.replace(['/', '.', ' ', '&'], "-").to_lowercase()
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate a JSON report.
pub fn generate_json_report(aggregate: &Aggregate) -> Result<String, SinkError> {
    serde_json::to_string_pretty(aggregate).map_err(Into::into)
}
