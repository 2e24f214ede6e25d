//! Fixed-column activity log lines.
//!
//! ```text
//! efz20050101.001200 42
//! ^  ^   ^ ^         ^
//! 0  3   7 9         19
//! ```
//!
//! Columns `[3,7)`, `[7,9)` and `[9,11)` hold the year, month and day; the
//! value starts at column 19 and runs to the end of the line.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::error::LogError;
use crate::models::LogEntry;
use crate::regions::RegionOutcome;

const VALUE_COLUMN: usize = 19;

/// Parse one log line. `line_number` is 1-based and only used in errors.
pub fn parse_line(line: &str, line_number: usize) -> Result<LogEntry, LogError> {
    let field = |range: std::ops::Range<usize>, name: &str| -> Result<u32, LogError> {
        line.get(range)
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| LogError::Format {
                line: line_number,
                reason: format!("unreadable {} column", name),
            })
    };

    let year = field(3..7, "year")?;
    let month = field(7..9, "month")?;
    let day = field(9..11, "day")?;

    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| LogError::Format {
        line: line_number,
        reason: format!("{:04}-{:02}-{:02} is not a calendar date", year, month, day),
    })?;

    let raw_field = line.get(VALUE_COLUMN..).unwrap_or("").trim().to_string();
    Ok(LogEntry { date, raw_field })
}

/// Parse every non-blank line from `reader`, in order.
pub fn read_entries<R: BufRead>(reader: R) -> Result<Vec<LogEntry>, LogError> {
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parse_line(line, index + 1)?);
    }
    Ok(entries)
}

pub fn read_log_file(path: &Path) -> Result<Vec<LogEntry>, LogError> {
    let file = File::open(path)?;
    read_entries(BufReader::new(file))
}

/// Render a log line: three-character prefix, `YYYYMMDD.HHMMSS`, a space and
/// the value.
pub fn format_line(prefix: &str, timestamp: NaiveDateTime, value: &str) -> String {
    let prefix: String = prefix.chars().chain(std::iter::repeat('_')).take(3).collect();
    format!("{}{} {}", prefix, timestamp.format("%Y%m%d.%H%M%S"), value)
}

/// Log value for a region count; invalid outcomes are written as `nan`, which
/// reads back as an invalid sample.
pub fn outcome_value(outcome: &RegionOutcome) -> String {
    match outcome.count() {
        Some(n) => n.to_string(),
        None => "nan".to_string(),
    }
}

pub fn write_lines<W: Write>(mut writer: W, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{4})(\d{2})(\d{2})(?:[._T-]?(\d{2})(\d{2})(\d{2}))?")
            .expect("timestamp pattern is a valid regex")
    })
}

/// Extract the observation time embedded in an image file name such as
/// `efz20050101.001200` or `eit_20050101T001200.fits`.
pub fn timestamp_from_name(name: &str) -> Option<NaiveDateTime> {
    timestamp_pattern().captures_iter(name).find_map(|caps| {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let date = NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)?;
        let time = match (num(4), num(5), num(6)) {
            (Some(h), Some(m), Some(s)) => NaiveTime::from_hms_opt(h, m, s)?,
            _ => NaiveTime::MIN,
        };
        Some(date.and_time(time))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_line_layout() {
        let entry = parse_line("efz20050107.001200 42", 1).unwrap();
        assert_eq!(entry.date, date(2005, 1, 7));
        assert_eq!(entry.raw_field, "42");
    }

    #[test]
    fn test_parse_line_keeps_marker() {
        let entry = parse_line("efz20050107.001200 nan", 1).unwrap();
        assert_eq!(entry.raw_field, "nan");

        let entry = parse_line("efz20050107.001200", 1).unwrap();
        assert_eq!(entry.raw_field, "");
    }

    #[test]
    fn test_parse_line_errors() {
        match parse_line("efz2005", 7) {
            Err(LogError::Format { line, .. }) => assert_eq!(line, 7),
            other => panic!("expected format error, got {:?}", other),
        }
        assert!(parse_line("efz20050230.001200 5", 1).is_err());
        assert!(parse_line("efzABCD0101.001200 5", 1).is_err());
    }

    #[test]
    fn test_read_entries_skips_blank_lines() {
        let text = "efz20050101.001200 10\n\nefz20050103.001200 30\r\n   \n";
        let entries = read_entries(Cursor::new(text)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].date, date(2005, 1, 3));
        assert_eq!(entries[1].raw_field, "30");
    }

    #[test]
    fn test_read_entries_reports_line_number() {
        let text = "efz20050101.001200 10\nbroken\n";
        match read_entries(Cursor::new(text)) {
            Err(LogError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_format_line_matches_layout() {
        let ts = date(2005, 3, 9).and_hms_opt(0, 12, 0).unwrap();
        let line = format_line("efz", ts, "17");
        assert_eq!(line, "efz20050309.001200 17");

        let entry = parse_line(&line, 1).unwrap();
        assert_eq!(entry.date, date(2005, 3, 9));
        assert_eq!(entry.raw_field, "17");

        assert_eq!(format_line("e", ts, "1"), "e__20050309.001200 1");
        assert_eq!(format_line("longer", ts, "1"), "lon20050309.001200 1");
    }

    #[test]
    fn test_outcome_value() {
        assert_eq!(outcome_value(&RegionOutcome::Counted { regions: 12 }), "12");
        assert_eq!(
            outcome_value(&RegionOutcome::Malformed {
                reason: "empty".into()
            }),
            "nan"
        );
    }

    #[test]
    fn test_timestamp_from_name() {
        assert_eq!(
            timestamp_from_name("efz20050101.001200"),
            Some(date(2005, 1, 1).and_hms_opt(0, 12, 0).unwrap())
        );
        assert_eq!(
            timestamp_from_name("eit_20071231T234800.fits"),
            Some(date(2007, 12, 31).and_hms_opt(23, 48, 0).unwrap())
        );
        assert_eq!(
            timestamp_from_name("sun-20060615.png"),
            Some(date(2006, 6, 15).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(timestamp_from_name("frame.fits"), None);
    }
}
