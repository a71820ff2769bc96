use std::borrow::Cow;
use std::fmt::Write as _;

use crate::result::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders a result set as an elastic text table under a title line.
/// Numeric columns are right-aligned.
pub fn render_result(result: &ResultSet) -> String {
    let aligns = result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, _)| {
            let numeric = !result.rows.is_empty()
                && result
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .all(|cell| cell.is_numeric() || cell.to_string().is_empty());
            if numeric { Align::Right } else { Align::Left }
        })
        .collect::<Vec<_>>();
    let mut output = String::new();
    if result.description.is_empty() {
        let _ = writeln!(output, "== {}", result.name);
    } else {
        let _ = writeln!(output, "== {}: {}", result.name, result.description);
    }
    output.push_str(&render_table(&result.columns, &result.display_rows(), &aligns));
    output
}

pub fn render_table(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, aligns));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }
    if rows.is_empty() {
        let _ = writeln!(output, "(no rows)");
    }
    output
}

pub fn print_result(result: &ResultSet) {
    println!("{}", render_result(result));
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
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Cell;

    #[test]
    fn numeric_columns_align_right() {
        let mut result = ResultSet::new(
            "quantity_by_account_type",
            vec!["account_type".into(), "total_quantity".into()],
        );
        result
            .rows
            .push(vec![Cell::text("Pharmacy"), Cell::Integer(1200)]);
        result
            .rows
            .push(vec![Cell::text("Appliance"), Cell::Integer(50)]);
        let rendered = render_result(&result);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "== quantity_by_account_type");
        assert_eq!(lines[1], "account_type  total_quantity");
        assert_eq!(lines[3], "Pharmacy                1200");
        assert_eq!(lines[4], "Appliance                 50");
    }

    #[test]
    fn control_characters_are_flattened() {
        let headers = vec!["note".to_string()];
        let rows = vec![vec!["line1\nline2\tvalue".to_string()]];
        let rendered = render_table(&headers, &rows, &[Align::Left]);
        assert_eq!(rendered.lines().nth(2), Some("line1 line2 value"));
    }

    #[test]
    fn empty_results_say_so() {
        let mut result = ResultSet::new("empty", vec!["percent".into()]);
        result.description = "Nothing matched".into();
        let rendered = render_result(&result);
        assert!(rendered.starts_with("== empty: Nothing matched"));
        assert!(rendered.contains("(no rows)"));
    }
}
