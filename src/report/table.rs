//! Bordered, right-aligned text table

use crate::summary::{ProbeResult, COLUMNS};

/// Header labels, in `COLUMNS` order
fn headers() -> Vec<String> {
    COLUMNS
        .iter()
        .map(|column| column.replace('_', " ").to_uppercase())
        .collect()
}

/// Render the results as a table with one header row and one row per result
///
/// ```text
/// +------+---------------+--------+
/// | NAME |       ADDRESS | STATUS |
/// +------+---------------+--------+
/// |    a | http://a:9090 |     OK |
/// +------+---------------+--------+
/// ```
pub fn render(results: &[ProbeResult]) -> String {
    let headers = headers();
    let rows: Vec<[String; 11]> = results.iter().map(ProbeResult::row).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = separator_line(&widths);
    let mut out = String::new();
    out.push_str(&separator);
    out.push_str(&row_line(&headers, &widths));
    out.push_str(&separator);
    for row in &rows {
        out.push_str(&row_line(row, &widths));
    }
    if !rows.is_empty() {
        out.push_str(&separator);
    }
    out
}

fn separator_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn row_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        // Newlines in error messages would break the grid
        let cell = cell.replace(['\r', '\n'], " ");
        let padding = width.saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(&" ".repeat(padding));
        line.push_str(&cell);
        line.push_str(" |");
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeError, ProbeStep, QueryError};
    use crate::registry::TargetDescriptor;
    use crate::summary::ProbeFields;

    fn results() -> Vec<ProbeResult> {
        vec![
            ProbeResult::completed(
                &TargetDescriptor::new("a", "http://a:9090"),
                ProbeFields {
                    version: Some("2.30.0".to_string()),
                    ..ProbeFields::default()
                },
                Ok(()),
            ),
            ProbeResult::failed(
                &TargetDescriptor::new("b", "http://b:9090"),
                ProbeError::query(
                    ProbeStep::BuildInfo,
                    QueryError::Http("connection\nrefused".to_string()),
                ),
            ),
        ]
    }

    #[test]
    fn test_one_header_and_one_row_per_result() {
        let rendered = render(&results());
        let rows: Vec<&str> = rendered.lines().filter(|l| l.starts_with('|')).collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains("NAME"));
        assert!(rows[0].contains("NUMBER OF INGESTED SAMPLES PER SECOND"));
        assert!(rows[1].contains("2.30.0"));
        assert!(rows[2].contains("NotOK"));
    }

    #[test]
    fn test_header_column_order() {
        let rendered = render(&[]);
        let header = rendered.lines().nth(1).unwrap();
        let labels: Vec<&str> = header
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        assert_eq!(labels[0], "NAME");
        assert_eq!(labels[2], "STATUS");
        assert_eq!(labels[3], "ERROR");
        assert_eq!(labels[10], "NUMBER OF INGESTED SAMPLES PER SECOND");
        assert_eq!(labels.len(), COLUMNS.len());
    }

    #[test]
    fn test_cells_are_right_aligned_and_lines_equal_width() {
        let rendered = render(&results());
        let widths: Vec<usize> = rendered.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));

        // "a" is padded on the left to the width of "NAME"
        let row = rendered.lines().nth(3).unwrap();
        assert!(row.starts_with("|    a |"));
    }
}
