//! Pipe/tab separated tables.
//!
//! Consecutive rows with at least two cells form a table; the first row is
//! the header. Flattened DOCX table rows arrive as separate blocks and are
//! joined back together.

use serde::{Deserialize, Serialize};

use crate::{BlockKind, ParsedText};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// All tables in document order.
pub fn extract_tables(parsed: &ParsedText) -> Vec<Table> {
    let mut lines: Vec<&str> = Vec::new();
    let mut blocks = parsed.blocks.iter().peekable();
    while let Some(block) = blocks.next() {
        lines.extend(block.text.lines());
        let joined_row = block.kind == BlockKind::TableRow
            && blocks
                .peek()
                .is_some_and(|next| next.kind == BlockKind::TableRow);
        if !joined_row {
            lines.push("");
        }
    }
    tables_from_lines(lines)
}

fn tables_from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in lines {
        match row_cells(line) {
            Some(cells) if cells.len() >= 2 => current.push(cells),
            // Markdown alignment rows (`|---|:--:|`) stay inside the table.
            Some(_) if is_separator_row(line) => {}
            _ => finish_table(&mut tables, &mut current),
        }
    }
    finish_table(&mut tables, &mut current);

    tracing::debug!(tables = tables.len(), "extracted tables");
    tables
}

fn row_cells(line: &str) -> Option<Vec<String>> {
    if is_separator_row(line) {
        return Some(Vec::new());
    }
    let separator = if line.contains('|') {
        '|'
    } else if line.contains('\t') {
        '\t'
    } else {
        return None;
    };
    Some(
        line.split(separator)
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed.contains('|')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '+'))
}

fn finish_table(tables: &mut Vec<Table>, current: &mut Vec<Vec<String>>) {
    if current.len() >= 2 {
        let mut rows = std::mem::take(current);
        let headers = rows.remove(0);
        tables.push(Table { headers, rows });
    }
    current.clear();
}
