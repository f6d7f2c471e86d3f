//! Cell typing and value decoding for xlsx workbooks.
//! Number-format analysis decides whether a numeric cell holds an Excel
//! serial date; serial conversion handles the 1900 leap-year bug and the
//! 1904 epoch variant.

use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Raw cell classification as recorded in the sheet XML.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Plain numeric values
    Number,
    /// Date values stored as serial numbers from the 1900 epoch
    NumberDate1900,
    /// Date values stored as serial numbers from the 1904 epoch
    NumberDate1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values (#N/A and friends)
    Error,
}

impl CellType {
    /// Maps built-in Excel number format IDs to a cell type.
    /// Only date formats matter here; time-only formats stay numeric.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "22" => Some(Self::serial_date(is_1904)),
            _ => None,
        }
    }

    /// Analyses a custom number format string for date patterns.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_color = false;
        let mut is_date = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                _ => (),
            }
        }

        if is_date {
            Self::serial_date(is_1904)
        } else {
            Self::Number
        }
    }

    fn serial_date(is_1904: bool) -> Self {
        if is_1904 {
            Self::NumberDate1904
        } else {
            Self::NumberDate1900
        }
    }
}

/// A decoded cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// The cell rendered as trimmed text, `None` when empty.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Value::Empty => return None,
            Value::Bool(value) => value.to_string(),
            Value::Number(value) => value.to_string(),
            Value::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                text.to_string()
            }
            Value::Date(date) => date.format("%Y-%m-%d").to_string(),
        };
        Some(text)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            Value::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            Value::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(date) => Some(*date),
            Value::Text(text) => parse_iso_date(text.trim()),
            _ => None,
        }
    }
}

/// Converts an Excel serial day count to a calendar date.
/// Base 1899-12-30 with the Lotus 1-2-3 leap-year offset for the 1900
/// epoch; the 1904 epoch sits a fixed 1462 days later.
pub(crate) fn serial_to_date(serial: f64, is_1904: bool) -> Option<NaiveDate> {
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(days + offset))
}

/// Parses an ISO 8601 date or date-time string, discarding any time part.
pub(crate) fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    if text.contains('T') {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|datetime| datetime.date())
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_serial_to_date_1900_epoch() {
        assert_eq!(serial_to_date(1.0, false), Some(date(1900, 1, 1)));
        // The phantom 1900-02-29 collapses onto the 28th
        assert_eq!(serial_to_date(60.0, false), Some(date(1900, 2, 28)));
        assert_eq!(serial_to_date(61.0, false), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_date(45292.0, false), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_serial_to_date_1904_epoch() {
        assert_eq!(serial_to_date(0.0, true), Some(date(1904, 1, 1)));
        assert_eq!(serial_to_date(43830.0, true), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_builtin_format_detection() {
        assert_eq!(
            CellType::parse_builtin_number_format_id("14", false),
            Some(CellType::NumberDate1900)
        );
        assert_eq!(
            CellType::parse_builtin_number_format_id("22", true),
            Some(CellType::NumberDate1904)
        );
        // General and time-only formats are not dates
        assert_eq!(CellType::parse_builtin_number_format_id("0", false), None);
        assert_eq!(CellType::parse_builtin_number_format_id("20", false), None);
    }

    #[test]
    fn test_custom_format_detection() {
        assert_eq!(
            CellType::parse_custom_number_format("yyyy\\-mm\\-dd", false),
            CellType::NumberDate1900
        );
        assert_eq!(
            CellType::parse_custom_number_format("mmm-yyyy", false),
            CellType::NumberDate1900
        );
        // Literal text containing date letters must not trigger detection
        assert_eq!(
            CellType::parse_custom_number_format("0.00\" dollars\"", false),
            CellType::Number
        );
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Text("  7.5 ".into()).as_number(), Some(7.5));
        assert_eq!(Value::Text("  x ".into()).as_text().as_deref(), Some("x"));
        assert!(Value::Text("   ".into()).is_empty());
        assert_eq!(
            Value::Text("2021-06-30".into()).as_date(),
            Some(date(2021, 6, 30))
        );
    }
}
