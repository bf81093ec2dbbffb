use crate::error::{DronitorError, Result};
use crate::models::NewReading;
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, FIELDS_PER_LINE, FIELD_SEPARATOR};
use encoding_rs::UTF_8;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// How whitespace-only lines inside an upload are treated.
///
/// Blank lines after the last reading are ignored under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinePolicy {
    /// Skip interior blank lines.
    #[default]
    Lenient,
    /// Reject the batch at the first interior blank line.
    Strict,
}

/// Readings parsed from one upload, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch {
    pub readings: Vec<NewReading>,
    pub lines_processed: usize,
    pub blank_lines_skipped: usize,
}

impl ParsedBatch {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Parses `longitude,latitude,aqi` uploads. All-or-nothing: the first bad
/// line fails the whole batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchParser {
    line_policy: LinePolicy,
}

impl BatchParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_policy(line_policy: LinePolicy) -> Self {
        Self { line_policy }
    }

    /// Parse a raw upload. A leading UTF-8 byte order mark is dropped.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParsedBatch> {
        let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
        if had_errors {
            return Err(DronitorError::InvalidEncoding);
        }
        self.parse_str(&text)
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<ParsedBatch> {
        let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, reader);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.parse_bytes(&bytes)
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedBatch> {
        let file = File::open(path)?;
        self.parse_reader(file)
    }

    pub fn parse_str(&self, content: &str) -> Result<ParsedBatch> {
        let lines: Vec<&str> = content
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();

        // Everything after the last non-blank line is editor noise
        let Some(last_content) = lines.iter().rposition(|line| !line.trim().is_empty()) else {
            return Err(DronitorError::EmptyBatch);
        };

        let mut readings = Vec::with_capacity(last_content + 1);
        let mut blank_lines_skipped = 0;

        for (index, line) in lines[..=last_content].iter().enumerate() {
            let line_number = index + 1;

            if line.trim().is_empty() {
                match self.line_policy {
                    LinePolicy::Lenient => {
                        blank_lines_skipped += 1;
                        continue;
                    }
                    LinePolicy::Strict => {
                        return Err(DronitorError::BlankLine { line: line_number });
                    }
                }
            }

            readings.push(self.parse_line(line, line_number)?);
        }

        debug!(
            "Parsed {} readings from {} lines ({} blank skipped)",
            readings.len(),
            last_content + 1,
            blank_lines_skipped
        );

        Ok(ParsedBatch {
            readings,
            lines_processed: last_content + 1,
            blank_lines_skipped,
        })
    }

    /// Parse a single `longitude,latitude,aqi` line
    fn parse_line(&self, line: &str, line_number: usize) -> Result<NewReading> {
        let mut tokens = Vec::with_capacity(FIELDS_PER_LINE);
        tokens.extend(line.split(FIELD_SEPARATOR));

        NewReading::from_tokens(&tokens).map_err(|source| DronitorError::Validation {
            line: line_number,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, RecordError};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_two_readings() {
        let parser = BatchParser::new();
        let batch = parser
            .parse_str("-73.935242,40.730610,42\n-73.935242,40.730610,45\n")
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.lines_processed, 2);
        assert_eq!(batch.blank_lines_skipped, 0);
        assert_eq!(batch.readings[0].aqi, 42);
        assert_eq!(batch.readings[1].aqi, 45);
        assert_eq!(batch.readings[1].longitude, -73.935242);
        assert_eq!(batch.readings[1].latitude, 40.730610);
    }

    #[test]
    fn test_missing_final_newline() {
        let batch = BatchParser::new().parse_str("1,2,3\n4,5,6").unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_crlf_line_endings() {
        let batch = BatchParser::new().parse_str("1,2,3\r\n4,5,6\r\n").unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.readings[1].aqi, 6);
    }

    #[test]
    fn test_lenient_skips_interior_blank_lines() {
        let batch = BatchParser::new()
            .parse_str("1,2,3\n\n   \n4,5,6\n\n\n")
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.lines_processed, 4);
        assert_eq!(batch.blank_lines_skipped, 2);
    }

    #[test]
    fn test_strict_rejects_interior_blank_line() {
        let parser = BatchParser::with_line_policy(LinePolicy::Strict);
        let err = parser.parse_str("1,2,3\n\n4,5,6\n").unwrap_err();
        assert!(matches!(err, DronitorError::BlankLine { line: 2 }));

        // Trailing blank lines are still fine
        let batch = parser.parse_str("1,2,3\n4,5,6\n\n").unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_out_of_range_longitude_reports_line_and_field() {
        let err = BatchParser::new().parse_str("200,40.0,10\n").unwrap_err();

        assert_eq!(err.line(), Some(1));
        assert_eq!(err.field(), Some("longitude"));
        match err {
            DronitorError::Validation { source, .. } => {
                assert!(matches!(
                    source,
                    RecordError::OutOfRange {
                        field: Field::Longitude,
                        ..
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let err = BatchParser::new().parse_str("1,2\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert!(err.to_string().contains("wrong field count"));
    }

    #[test]
    fn test_first_bad_line_fails_whole_batch() {
        let err = BatchParser::new()
            .parse_str("1,2,3\n4,5,6\n7,abc,9\n10,11,12\n")
            .unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.field(), Some("latitude"));
    }

    #[test]
    fn test_line_numbers_count_skipped_blanks() {
        let err = BatchParser::new()
            .parse_str("1,2,3\n\n1,2,-5\n")
            .unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.field(), Some("aqi"));
    }

    #[test]
    fn test_empty_inputs() {
        let parser = BatchParser::new();
        assert!(matches!(parser.parse_str(""), Err(DronitorError::EmptyBatch)));
        assert!(matches!(
            parser.parse_str("\n  \n\n"),
            Err(DronitorError::EmptyBatch)
        ));
        assert!(matches!(
            BatchParser::with_line_policy(LinePolicy::Strict).parse_str("\n"),
            Err(DronitorError::EmptyBatch)
        ));
    }

    #[test]
    fn test_bytes_with_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"1.5,2.5,3\n");
        let batch = BatchParser::new().parse_bytes(&bytes).unwrap();
        assert_eq!(batch.readings[0].longitude, 1.5);
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = BatchParser::new()
            .parse_bytes(&[b'1', b',', 0xFF, b',', b'3'])
            .unwrap_err();
        assert!(matches!(err, DronitorError::InvalidEncoding));
    }

    #[test]
    fn test_parse_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "10.0,20.0,30")?;
        writeln!(temp_file, "11.0,21.0,31")?;

        let batch = BatchParser::new().parse_file(temp_file.path())?;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.readings[1].raw_data, "11.0,21.0,31");

        Ok(())
    }
}
