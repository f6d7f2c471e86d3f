//! Per-series metadata records.
//!
//! ABS workbooks carry an Index sheet listing every series in the file;
//! each row becomes one [`SeriesMetadata`]. RBA tables carry the same
//! information transposed into the rows above the data block.

use chrono::NaiveDate;

/// Index-sheet column headers a metadata block must carry.
pub const HEADER_DESCRIPTION: &str = "Data Item Description";
pub const HEADER_SERIES_ID: &str = "Series ID";
pub const HEADER_SERIES_TYPE: &str = "Series Type";
pub const HEADER_UNIT: &str = "Unit";

/// Headers read when present but not required.
pub const HEADER_DATA_TYPE: &str = "Data Type";
pub const HEADER_FREQUENCY: &str = "Freq.";
pub const HEADER_SERIES_START: &str = "Series Start";
pub const HEADER_SERIES_END: &str = "Series End";
pub const HEADER_OBSERVATIONS: &str = "No. Obs.";

pub const REQUIRED_HEADERS: [&str; 4] = [
    HEADER_DESCRIPTION,
    HEADER_SERIES_ID,
    HEADER_SERIES_TYPE,
    HEADER_UNIT,
];

/// Everything a publisher states about one series, plus the table it was
/// found in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesMetadata {
    pub description: String,
    pub series_id: String,
    pub series_type: String,
    pub unit: String,
    pub data_type: String,
    pub frequency: String,
    /// Table name the series was extracted from, stamped by the extractor.
    pub table: String,
    pub table_description: String,
    pub catalogue_id: String,
    pub series_start: Option<NaiveDate>,
    pub series_end: Option<NaiveDate>,
    pub observations: Option<usize>,
}

/// Spelled-out forms for the abbreviated unit strings the publishers use.
/// Order matters: longer, more specific patterns are tried first so that
/// "$'000,000" never decays into "$ Thousand,000".
const UNIT_REPLACEMENTS: [(&str, &str); 5] = [
    ("000 Hours", "Thousand Hours"),
    ("$'000,000", "$ Million"),
    ("$'000", "$ Thousand"),
    ("000,000", "Millions"),
    ("000", "Thousands"),
];

/// Rewrites an abbreviated unit into its spelled-out form. Idempotent:
/// already-normalised units pass through unchanged.
pub fn normalise_unit(unit: &str) -> String {
    let mut unit = unit.to_string();
    for (pattern, replacement) in UNIT_REPLACEMENTS {
        unit = unit.replace(pattern, replacement);
    }
    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_unit_replacements() {
        assert_eq!(normalise_unit("$'000,000"), "$ Million");
        assert_eq!(normalise_unit("$'000"), "$ Thousand");
        assert_eq!(normalise_unit("000,000"), "Millions");
        assert_eq!(normalise_unit("000"), "Thousands");
        assert_eq!(normalise_unit("000 Hours"), "Thousand Hours");
        assert_eq!(normalise_unit("Percent"), "Percent");
    }

    #[test]
    fn test_normalise_unit_rewrites_every_occurrence() {
        assert_eq!(
            normalise_unit("000 Hours per 000"),
            "Thousand Hours per Thousands"
        );
    }

    #[test]
    fn test_normalise_unit_is_idempotent() {
        for raw in ["$'000,000", "$'000", "000,000", "000", "000 Hours", "Index"] {
            let once = normalise_unit(raw);
            assert_eq!(normalise_unit(&once), once, "unit {raw:?} is not stable");
        }
    }
}
