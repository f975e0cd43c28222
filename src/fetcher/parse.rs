//! Report table extraction from company pages.
//!
//! Each report lives in a `<section id="{kind}">` block holding a single
//! data table. The first header row gives the period labels and every
//! body row is one attribute followed by its values in column order.
//! Tag matching is case-insensitive: scanning happens on an ASCII
//! lowercased copy, whose byte offsets line up with the source text.

use super::FetchError;
use crate::models::{AttributeTable, ReportKind};
use tracing::debug;

/// Attribute holding the column labels taken from the header row.
pub const PERIOD_ATTRIBUTE: &str = "Period";

/// Extract the table of one report section from a page.
///
/// A missing section is an error; a section without a table is an empty
/// report.
pub fn parse_report_table(html: &str, kind: ReportKind) -> Result<AttributeTable, FetchError> {
    let lower = html.to_ascii_lowercase();

    let (body_start, body_end) =
        find_section(&lower, kind.as_str()).ok_or(FetchError::SectionNotFound(kind))?;

    let table_open = match find_tag(&lower[..body_end], body_start, "table") {
        Some(pos) => pos,
        None => {
            debug!(report = %kind, "section has no table");
            return Ok(AttributeTable::new());
        }
    };
    let table_close = lower[table_open..body_end]
        .find("</table>")
        .map(|x| table_open + x)
        .ok_or_else(|| FetchError::Parse(format!("unterminated table in section {}", kind)))?;

    let mut table = AttributeTable::new();
    let mut header_seen = false;

    for (row_start, row_end) in rows(&lower, table_open, table_close) {
        let cells = cells(html, &lower, row_start, row_end);
        if cells.is_empty() {
            continue;
        }

        if !header_seen && cells.iter().all(|c| c.header) {
            header_seen = true;
            let periods: Vec<String> = cells[1..].iter().map(|c| cell_text(c.raw)).collect();
            if periods.iter().any(|p| !p.is_empty()) {
                table.insert(PERIOD_ATTRIBUTE.to_string(), periods);
            }
            continue;
        }

        let name = attribute_name(cells[0].raw);
        if name.is_empty() {
            continue;
        }
        let values: Vec<String> = cells[1..].iter().map(|c| cell_text(c.raw)).collect();
        if table.insert(name.clone(), values).is_some() {
            debug!(report = %kind, attribute = %name, "repeated attribute, keeping last row");
        }
    }

    Ok(table)
}

/// Locate `<section ... id="{id}" ...>` and return the byte range of its body.
fn find_section(lower: &str, id: &str) -> Option<(usize, usize)> {
    let double = format!("id=\"{}\"", id);
    let single = format!("id='{}'", id);
    let mut pos = 0usize;

    while let Some(open) = find_tag(lower, pos, "section") {
        let open_end = open + lower[open..].find('>')?;
        let attrs = &lower[open..open_end];

        if attrs.contains(&double) || attrs.contains(&single) {
            let body_start = open_end + 1;
            let body_end = lower[body_start..]
                .find("</section>")
                .map(|x| body_start + x)
                .unwrap_or(lower.len());
            return Some((body_start, body_end));
        }
        pos = open_end + 1;
    }
    None
}

/// Find the next `<name` opening tag at or after `from`, ignoring tags
/// that merely share the prefix (`<th` vs `<thead`).
fn find_tag(lower: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut pos = from;

    while pos <= lower.len() {
        let at = pos + lower[pos..].find(&needle)?;
        let next = lower.as_bytes().get(at + needle.len()).copied();
        match next {
            Some(b'>') | Some(b'/') => return Some(at),
            Some(c) if c.is_ascii_whitespace() => return Some(at),
            None => return None,
            _ => pos = at + needle.len(),
        }
    }
    None
}

/// Byte ranges of every `<tr>` inside the table.
fn rows(lower: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let scope = &lower[..end];
    let mut rows = Vec::new();
    let mut pos = start;

    while let Some(open) = find_tag(scope, pos, "tr") {
        let next_row = find_tag(scope, open + 3, "tr").unwrap_or(end);
        let close = scope[open..next_row]
            .find("</tr>")
            .map(|x| open + x)
            .unwrap_or(next_row);
        rows.push((open, close));
        pos = close.max(open + 3);
    }
    rows
}

struct Cell<'a> {
    raw: &'a str,
    header: bool,
}

/// Cells of a single row, in column order.
fn cells<'a>(html: &'a str, lower: &str, start: usize, end: usize) -> Vec<Cell<'a>> {
    let scope = &lower[..end];
    let mut cells = Vec::new();
    let mut pos = start;

    loop {
        let td = find_tag(scope, pos, "td");
        let th = find_tag(scope, pos, "th");
        let (open, header) = match (td, th) {
            (Some(d), Some(h)) if h < d => (h, true),
            (Some(d), _) => (d, false),
            (None, Some(h)) => (h, true),
            (None, None) => break,
        };

        let inner_start = match scope[open..].find('>') {
            Some(x) => open + x + 1,
            None => break,
        };
        let close_tag = if header { "</th>" } else { "</td>" };
        let next_cell = [find_tag(scope, inner_start, "td"), find_tag(scope, inner_start, "th")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(end);
        let inner_end = scope[inner_start..next_cell]
            .find(close_tag)
            .map(|x| inner_start + x)
            .unwrap_or(next_cell);

        cells.push(Cell {
            raw: &html[inner_start..inner_end],
            header,
        });
        pos = inner_end;
    }
    cells
}

/// Visible text of a cell: tags dropped, entities decoded, whitespace collapsed.
fn cell_text(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Row label with the trailing `+` expander marker removed.
fn attribute_name(raw: &str) -> String {
    let text = cell_text(raw);
    text.trim_end_matches('+').trim_end().to_string()
}

fn decode_entities(s: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
