//! Plain-text table rendering for previews and column listings.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::data::Value;

const NULL_CELL: &str = "NULL";
const MAX_CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let aligns = vec![Align::Left; headers.len()];
    render(headers, rows, &aligns)
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Renders decoded rows; nulls show as `NULL` and numeric columns are right aligned.
pub fn render_rows(headers: &[String], rows: &[Vec<Option<Value>>]) -> String {
    let aligns = (0..headers.len())
        .map(|idx| {
            let numeric = rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(Option::as_ref))
                .all(is_numeric);
            if numeric && rows.iter().any(|row| matches!(row.get(idx), Some(Some(_)))) {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect::<Vec<_>>();
    let cells = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| match value {
                    Some(value) => truncate(&value.as_display()),
                    None => NULL_CELL.to_string(),
                })
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    render(headers, &cells, &aligns)
}

pub fn print_rows(headers: &[String], rows: &[Vec<Option<Value>>]) {
    print!("{}", render_rows(headers, rows));
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Integer(_) | Value::Float(_) | Value::Decimal(_))
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_CELL_WIDTH {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(MAX_CELL_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}

fn render(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let left = vec![Align::Left; widths.len()];
    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &left));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &left));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            match aligns.get(idx).copied().unwrap_or(Align::Left) {
                Align::Left => format!("{sanitized}{padding}"),
                Align::Right => format!("{padding}{sanitized}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
