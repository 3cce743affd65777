//! Comma-separated values, RFC 4180 quoting

use crate::summary::{ProbeResult, COLUMNS};

/// Render a header row of field names followed by one row per result
pub fn render(results: &[ProbeResult]) -> String {
    let mut out = String::new();
    push_record(&mut out, COLUMNS.iter().copied());
    for result in results {
        let row = result.row();
        push_record(&mut out, row.iter().map(String::as_str));
    }
    out
}

fn push_record<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(cell));
    }
    out.push('\n');
}

/// Quote a cell if it contains a separator, quote or line break
fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeError, ProbeStep, QueryError};
    use crate::registry::TargetDescriptor;
    use crate::summary::ProbeFields;

    #[test]
    fn test_header_and_rows() {
        let results = vec![
            ProbeResult::completed(
                &TargetDescriptor::new("a", "http://a:9090"),
                ProbeFields {
                    ingested_samples_per_second: Some(5.0),
                    ..ProbeFields::default()
                },
                Ok(()),
            ),
            ProbeResult::failed(
                &TargetDescriptor::new("b", "http://b:9090"),
                ProbeError::query(
                    ProbeStep::Targets,
                    QueryError::Api {
                        error_type: "bad_data".to_string(),
                        message: "invalid \"match[]\", got 2".to_string(),
                    },
                ),
            ),
        ];

        let rendered = render(&results);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], COLUMNS.join(","));
        assert_eq!(lines[1], "a,http://a:9090,OK,,,,,,,,5.0");
        assert_eq!(
            lines[2],
            "b,http://b:9090,NotOK,\"getting targets: bad_data: invalid \"\"match[]\"\", got 2\",,,,,,,"
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }
}
