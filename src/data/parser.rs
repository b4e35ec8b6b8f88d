use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{ParseWarning, ParsedDocument, Record};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Delimited-text dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    pub delimiter: u8,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("document has no header line")]
    EmptyDocument,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse delimited text into records keyed by the first non-empty line.
///
/// * Header names and values are trimmed.
/// * Blank (or whitespace-only) lines are skipped. A line of bare
///   delimiters is a record of empty values.
/// * Short rows keep the columns they reach; long rows drop the extras.
///   Both are reported in [`ParsedDocument::warnings`], never as errors.
///
/// A document without any header line is [`ParseError::EmptyDocument`];
/// a header followed by nothing is a valid document with zero records.
pub fn parse_document(text: &str, options: &ParserOptions) -> Result<ParsedDocument, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(options.delimiter)
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                warnings.push(ParseWarning {
                    line,
                    message: format!("unreadable line skipped: {e}"),
                });
                continue;
            }
        };
        // Blank or whitespace-only. Delimiter-only lines are records.
        if row.len() <= 1 && row.iter().all(str::is_empty) {
            continue;
        }
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let columns = match header.as_ref() {
            Some(columns) => columns,
            None => {
                header = Some(read_header(&row, line, &mut warnings));
                continue;
            }
        };

        if row.len() != columns.len() {
            let message = if row.len() < columns.len() {
                format!(
                    "expected {} fields, found {}; missing columns left absent",
                    columns.len(),
                    row.len()
                )
            } else {
                format!(
                    "expected {} fields, found {}; extra fields dropped",
                    columns.len(),
                    row.len()
                )
            };
            warnings.push(ParseWarning { line, message });
        }

        let record: Record = columns
            .iter()
            .zip(row.iter())
            .map(|(c, v)| (c.as_str(), v))
            .collect();
        records.push(record);
    }

    let header = header.ok_or(ParseError::EmptyDocument)?;

    for w in &warnings {
        warn!("{w}");
    }
    debug!(
        "parsed {} records with columns {:?} ({} warnings)",
        records.len(),
        header,
        warnings.len()
    );

    Ok(ParsedDocument {
        header,
        records,
        warnings,
    })
}

fn read_header(row: &csv::StringRecord, line: u64, warnings: &mut Vec<ParseWarning>) -> Vec<String> {
    let columns: Vec<String> = row.iter().map(str::to_string).collect();
    for (i, name) in columns.iter().enumerate() {
        if columns[..i].contains(name) {
            warnings.push(ParseWarning {
                line,
                message: format!("duplicate column '{name}', later values win"),
            });
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedDocument {
        parse_document(text, &ParserOptions::default()).unwrap()
    }

    #[test]
    fn one_record_per_data_line() {
        let doc = parse("quarter,urate\n2020Q1,3.5\n2020Q2,13.0\n2020Q3,8.8\n");
        assert_eq!(doc.header, vec!["quarter", "urate"]);
        assert_eq!(doc.len(), 3);
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.records[1].get("urate"), Some("13.0"));
    }

    #[test]
    fn headers_and_values_are_trimmed() {
        let doc = parse(" quarter , urate \n 2020Q1 , 3.5 \n");
        assert_eq!(doc.header, vec!["quarter", "urate"]);
        assert_eq!(doc.records[0].get("quarter"), Some("2020Q1"));
        assert_eq!(doc.records[0].get("urate"), Some("3.5"));
    }

    #[test]
    fn blank_lines_are_not_records() {
        let doc = parse("\n\nquarter,urate\n\n2020Q1,3.5\n   \n2020Q2,4.0\n\n");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.records[0].get("quarter"), Some("2020Q1"));
        assert_eq!(doc.records[1].get("quarter"), Some("2020Q2"));
    }

    #[test]
    fn ragged_rows_align_positionally_with_warnings() {
        let doc = parse("quarter,urate,urate_gap\n2020Q1,3.5\n2020Q2,4.0,0.1,extra\n2020Q3,4.1,0.2\n");
        assert_eq!(doc.len(), 3);

        let short = &doc.records[0];
        assert_eq!(short.get("urate"), Some("3.5"));
        assert_eq!(short.get("urate_gap"), None);

        let long = &doc.records[1];
        assert_eq!(long.len(), 3);
        assert_eq!(long.get("urate_gap"), Some("0.1"));

        assert_eq!(doc.warnings.len(), 2);
        assert_eq!(doc.warnings[0].line, 2);
        assert_eq!(doc.warnings[1].line, 3);
    }

    #[test]
    fn delimiter_only_lines_are_records_of_empty_values() {
        let doc = parse("quarter,urate\n2020Q1,3.5\n,\n");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.records[1].get("quarter"), Some(""));
        assert_eq!(doc.records[1].get("urate"), Some(""));
        assert!(doc.warnings.is_empty());

        let doc = parse("quarter,urate\n2020Q1,3.5\n,\n2020Q2,4.0\n");
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.records[2].get("quarter"), Some("2020Q2"));
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_quotes() {
        let doc = parse("quarter,note\n2020Q1,\"a, \"\"b\"\"\"\n");
        assert_eq!(doc.records[0].get("note"), Some("a, \"b\""));
    }

    #[test]
    fn empty_text_is_empty_document() {
        assert_eq!(
            parse_document("", &ParserOptions::default()),
            Err(ParseError::EmptyDocument)
        );
        assert_eq!(
            parse_document("\n  \n\n", &ParserOptions::default()),
            Err(ParseError::EmptyDocument)
        );
    }

    #[test]
    fn header_only_is_a_valid_empty_document() {
        let doc = parse("quarter,urate\n");
        assert_eq!(doc.header, vec!["quarter", "urate"]);
        assert!(doc.is_empty());
    }

    #[test]
    fn custom_delimiter() {
        let doc = parse_document("quarter;urate\n2020Q1;3.5\n", &ParserOptions { delimiter: b';' })
            .unwrap();
        assert_eq!(doc.records[0].get("urate"), Some("3.5"));
    }
}
