//! Advisory CSV preflight for the upload stage.
//!
//! Reads a bounded sample of the selected file and reports what the user is
//! about to send: headers, line endings, an estimated row count and template
//! columns that are missing. Findings are warnings only. The server remains
//! the authority on row validity.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the sample inspected by the preflight (512 KB).
pub const PREFLIGHT_SAMPLE_SIZE: usize = 512 * 1024;

/// Maximum number of records parsed from the sample.
const MAX_RECORDS_TO_INSPECT: usize = 1000;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// What the preflight found in the selected file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    /// Headers found in the first row.
    pub headers: Vec<String>,
    /// Detected line ending style.
    pub line_endings: LineEndings,
    /// Data rows seen in the sample.
    pub sampled_rows: u64,
    /// Estimated data rows in the whole file.
    pub estimated_total_rows: Option<u64>,
    /// Findings worth showing before validation.
    pub warnings: Vec<PreflightWarning>,
}

impl PreflightReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Detected line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEndings {
    LF,
    CRLF,
    Mixed,
    Unknown,
}

/// Non-blocking findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreflightWarning {
    /// File is not valid UTF-8; names with accents may be garbled.
    NotUtf8,
    /// File starts with a UTF-8 BOM.
    HasBom,
    /// File contains both LF and CRLF line endings.
    MixedLineEndings,
    /// No header row could be read.
    NoHeaders,
    /// Header row lacks columns present in the template.
    MissingColumns { columns: Vec<String> },
    /// Row has a different number of fields than the header.
    InconsistentColumns { expected: usize, found: usize, row: u64 },
    /// Header row present but no data rows follow.
    NoDataRows,
    /// CSV could not be parsed past a certain point.
    Unparseable { message: String },
}

impl PreflightWarning {
    /// Short description for display under the file summary.
    pub fn message(&self) -> String {
        match self {
            PreflightWarning::NotUtf8 => {
                "File is not UTF-8 encoded; special characters may not import correctly".into()
            }
            PreflightWarning::HasBom => "File starts with a byte order mark".into(),
            PreflightWarning::MixedLineEndings => "File mixes Windows and Unix line endings".into(),
            PreflightWarning::NoHeaders => "No header row found".into(),
            PreflightWarning::MissingColumns { columns } => {
                format!("Missing template columns: {}", columns.join(", "))
            }
            PreflightWarning::InconsistentColumns {
                expected,
                found,
                row,
            } => format!("Row {} has {} columns, expected {}", row, found, expected),
            PreflightWarning::NoDataRows => "File has a header row but no data".into(),
            PreflightWarning::Unparseable { message } => format!("CSV parse problem: {}", message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Inspects the start of `bytes` and reports findings.
///
/// `expected_columns` are compared case-insensitively against the header row.
pub fn preflight(bytes: &[u8], expected_columns: &[String]) -> PreflightReport {
    let mut warnings = Vec::new();

    let sample_len = bytes.len().min(PREFLIGHT_SAMPLE_SIZE);
    let sample = &bytes[..sample_len];
    let is_sample_only = bytes.len() > sample_len;

    let has_bom = sample.starts_with(UTF8_BOM);
    if has_bom {
        warnings.push(PreflightWarning::HasBom);
    }
    let data = if has_bom {
        &sample[UTF8_BOM.len()..]
    } else {
        sample
    };

    // A sample may cut a multi-byte character; only the valid prefix matters.
    if let Err(e) = std::str::from_utf8(data) {
        if e.error_len().is_some() {
            warnings.push(PreflightWarning::NotUtf8);
        }
    }

    let line_endings = detect_line_endings(data);
    if line_endings == LineEndings::Mixed {
        warnings.push(PreflightWarning::MixedLineEndings);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let headers: Vec<String> = match reader.byte_headers() {
        Ok(h) => h
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect(),
        Err(e) => {
            warnings.push(PreflightWarning::Unparseable {
                message: e.to_string(),
            });
            Vec::new()
        }
    };

    if headers.iter().all(|h| h.is_empty()) {
        warnings.push(PreflightWarning::NoHeaders);
        return PreflightReport {
            headers: Vec::new(),
            line_endings,
            sampled_rows: 0,
            estimated_total_rows: None,
            warnings,
        };
    }

    let missing = missing_columns(&headers, expected_columns);
    if !missing.is_empty() {
        warnings.push(PreflightWarning::MissingColumns { columns: missing });
    }

    let mut sampled_rows: u64 = 0;
    let mut record_bytes: u64 = 0;

    let mut records = reader.byte_records().take(MAX_RECORDS_TO_INSPECT).peekable();
    while let Some(result) = records.next() {
        // The last record of a truncated sample is usually cut short.
        if is_sample_only && records.peek().is_none() {
            break;
        }
        match result {
            Ok(record) => {
                // Blank trailing lines parse as a single empty field.
                if record.len() == 1 && record.get(0).map_or(true, |f| f.is_empty()) {
                    continue;
                }
                sampled_rows += 1;
                if let Some(pos) = record.position() {
                    record_bytes = pos.byte();
                }
                if record.len() != headers.len() {
                    warnings.push(PreflightWarning::InconsistentColumns {
                        expected: headers.len(),
                        found: record.len(),
                        row: sampled_rows + 1,
                    });
                }
            }
            Err(e) => {
                // The sample boundary can cut a quoted field in half.
                if !(is_sample_only && is_likely_truncation_error(&e)) {
                    warnings.push(PreflightWarning::Unparseable {
                        message: e.to_string(),
                    });
                }
                break;
            }
        }
    }

    if sampled_rows == 0 && !is_sample_only {
        warnings.push(PreflightWarning::NoDataRows);
    }

    let estimated_total_rows =
        estimate_rows(bytes.len() as u64, sampled_rows, record_bytes, is_sample_only);

    PreflightReport {
        headers,
        line_endings,
        sampled_rows,
        estimated_total_rows,
        warnings,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn missing_columns(headers: &[String], expected: &[String]) -> Vec<String> {
    expected
        .iter()
        .filter(|col| !headers.iter().any(|h| h.eq_ignore_ascii_case(col)))
        .cloned()
        .collect()
}

/// Extrapolates the row count from the sample when the file was truncated.
fn estimate_rows(
    file_len: u64,
    sampled_rows: u64,
    last_record_start: u64,
    is_sample_only: bool,
) -> Option<u64> {
    if sampled_rows == 0 {
        return None;
    }
    if !is_sample_only || last_record_start == 0 {
        return Some(sampled_rows);
    }

    let avg_bytes_per_row = last_record_start as f64 / sampled_rows as f64;
    Some((file_len as f64 / avg_bytes_per_row).ceil() as u64)
}

/// Detects line ending style in the given bytes.
fn detect_line_endings(data: &[u8]) -> LineEndings {
    let mut has_lf = false;
    let mut has_crlf = false;

    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' && i + 1 < data.len() && data[i + 1] == b'\n' {
            has_crlf = true;
            i += 2;
        } else if data[i] == b'\n' {
            has_lf = true;
            i += 1;
        } else {
            i += 1;
        }
    }

    match (has_lf, has_crlf) {
        (true, true) => LineEndings::Mixed,
        (true, false) => LineEndings::LF,
        (false, true) => LineEndings::CRLF,
        (false, false) => LineEndings::Unknown,
    }
}

fn is_likely_truncation_error(err: &csv::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unexpected eof")
        || msg.contains("record ends in a quote")
        || msg.contains("premature eof")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Vec<String> {
        ["first_name", "last_name", "email"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn clean_file_has_no_warnings() {
        let content = b"first_name,last_name,email\nAna,Lopez,ana@example.com\nBo,Kim,bo@example.com\nCy,Ng,cy@example.com\n";

        let report = preflight(content, &template());

        assert!(!report.has_warnings(), "{:?}", report.warnings);
        assert_eq!(report.headers, vec!["first_name", "last_name", "email"]);
        assert_eq!(report.sampled_rows, 3);
        assert_eq!(report.estimated_total_rows, Some(3));
        assert_eq!(report.line_endings, LineEndings::LF);
    }

    #[test]
    fn header_matching_ignores_case() {
        let content = b"First_Name,LAST_NAME,Email\nAna,Lopez,ana@example.com\n";

        let report = preflight(content, &template());

        assert!(!report.has_warnings(), "{:?}", report.warnings);
    }

    #[test]
    fn reports_missing_template_columns() {
        let content = b"first_name,phone\nAna,555-0100\n";

        let report = preflight(content, &template());

        assert!(report.warnings.contains(&PreflightWarning::MissingColumns {
            columns: vec!["last_name".into(), "email".into()]
        }));
    }

    #[test]
    fn reports_bom_and_strips_it_from_headers() {
        let mut content = Vec::new();
        content.extend_from_slice(UTF8_BOM);
        content.extend_from_slice(b"first_name,last_name,email\nAna,Lopez,a@x.com\n");

        let report = preflight(&content, &template());

        assert!(report.warnings.contains(&PreflightWarning::HasBom));
        assert_eq!(report.headers[0], "first_name");
    }

    #[test]
    fn reports_inconsistent_rows() {
        let content = b"first_name,last_name,email\nAna,Lopez,a@x.com\nBo,Kim\n";

        let report = preflight(content, &template());

        assert!(report
            .warnings
            .contains(&PreflightWarning::InconsistentColumns {
                expected: 3,
                found: 2,
                row: 3
            }));
    }

    #[test]
    fn reports_non_utf8_content() {
        let content = b"first_name,last_name,email\n\xff\xfe,Lopez,a@x.com\n";

        let report = preflight(content, &template());

        assert!(report.warnings.contains(&PreflightWarning::NotUtf8));
    }

    #[test]
    fn reports_header_only_file() {
        let report = preflight(b"first_name,last_name,email\n", &template());

        assert!(report.warnings.contains(&PreflightWarning::NoDataRows));
        assert_eq!(report.estimated_total_rows, None);
    }

    #[test]
    fn ignores_blank_trailing_lines() {
        let content = b"first_name,last_name,email\nAna,Lopez,a@x.com\n\n\n";

        let report = preflight(content, &template());

        assert_eq!(report.sampled_rows, 1);
        assert!(!report.has_warnings(), "{:?}", report.warnings);
    }

    #[test]
    fn detects_crlf_and_mixed_endings() {
        let crlf = preflight(b"first_name,last_name,email\r\nAna,L,a@x.com\r\n", &template());
        let mixed = preflight(b"first_name,last_name,email\r\nAna,L,a@x.com\n", &template());

        assert_eq!(crlf.line_endings, LineEndings::CRLF);
        assert_eq!(mixed.line_endings, LineEndings::Mixed);
        assert!(mixed.warnings.contains(&PreflightWarning::MixedLineEndings));
    }

    #[test]
    fn large_file_is_estimated_from_sample() {
        let mut content = b"first_name,last_name,email\n".to_vec();
        let mut i = 0;
        while content.len() <= PREFLIGHT_SAMPLE_SIZE + 4096 {
            let row = format!("Name{},\"Last {}\",n{}@example.com\n", i, i, i);
            content.extend_from_slice(row.as_bytes());
            i += 1;
        }

        let report = preflight(&content, &template());

        assert!(
            !report
                .warnings
                .iter()
                .any(|w| matches!(w, PreflightWarning::Unparseable { .. })),
            "{:?}",
            report.warnings
        );
        let estimate = report.estimated_total_rows.expect("estimate");
        assert!(estimate >= report.sampled_rows);
    }

    #[test]
    fn warning_messages_are_nonempty() {
        let warnings = vec![
            PreflightWarning::NotUtf8,
            PreflightWarning::HasBom,
            PreflightWarning::MixedLineEndings,
            PreflightWarning::NoHeaders,
            PreflightWarning::MissingColumns {
                columns: vec!["email".into()],
            },
            PreflightWarning::InconsistentColumns {
                expected: 3,
                found: 2,
                row: 4,
            },
            PreflightWarning::NoDataRows,
            PreflightWarning::Unparseable {
                message: "bad quote".into(),
            },
        ];

        for warning in warnings {
            assert!(!warning.message().trim().is_empty(), "{:?}", warning);
        }
    }
}
