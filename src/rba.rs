//! RBA statistical table readers.
//!
//! RBA tables carry their metadata transposed above the data block: one
//! field per row, one series per column, with the field names in the
//! first column. Frequency is never declared, so it is inferred from the
//! day gaps between successive observation dates.

use crate::catalogue;
use crate::error::ReadAbsError;
use crate::fetch::Fetcher;
use crate::metadata::SeriesMetadata;
use crate::table;
use crate::table::Column;
use crate::table::Frequency;
use crate::table::Period;
use crate::table::Series;
use crate::table::Table;
use crate::workbook::Grid;
use crate::workbook::Workbook;
use chrono::NaiveDate;
use regex::Regex;
use std::ops::RangeInclusive;
use tracing::debug;

// Layout contract for RBA tables. Offsets are zero-based grid rows.
/// Rows of the transposed metadata block, field names in column 0.
const META_ROWS: RangeInclusive<usize> = 1..=10;
/// Row carrying the series identifiers above the data block.
const DATA_HEADER_ROW: usize = 10;

// Metadata field names as published. Older tables label the series
// identifier "Mnemonic".
const FIELD_TITLE: &str = "Title";
const FIELD_FREQUENCY: &str = "Frequency";
const FIELD_TYPE: &str = "Type";
const FIELD_UNITS: &str = "Units";
const FIELD_SERIES_ID: &str = "Series ID";
const FIELD_MNEMONIC: &str = "Mnemonic";

/// Cash-rate target series in table A2, published from this date on.
const CASH_RATE_TABLE: &str = "A2";
const CASH_RATE_SERIES: &str = "ARBAMPCNCRT";

/// Reads one RBA table, returning the period-indexed data and the
/// per-series metadata.
pub fn read_rba_table(
    fetcher: &dyn Fetcher,
    table_code: &str,
) -> Result<(Table, Vec<SeriesMetadata>), ReadAbsError> {
    let entry = catalogue::rba_catalogue_entry(table_code)
        .ok_or_else(|| ReadAbsError::CatalogueMiss(table_code.to_string()))?;
    let bytes = fetch_with_extension_fallback(fetcher, entry.url)?;

    let mut workbook = Workbook::open(bytes)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .map(|name| name.to_string())
        .unwrap_or_default();
    let grid = workbook.grid(&sheet)?;

    let table_description = grid.text(0, 0).unwrap_or_default();
    let metadata = extract_metadata(&grid, table_code, &table_description);
    let data = extract_data(&grid);
    Ok((data, metadata))
}

/// Reads the official cash rate from table A2, from the start of the
/// cash-rate target regime, carried forward to today. Resampled to
/// monthly cadence when `monthly` is set, daily otherwise, forward
/// filling either way.
pub fn read_rba_ocr(fetcher: &dyn Fetcher, monthly: bool) -> Result<Series, ReadAbsError> {
    let start = NaiveDate::from_ymd_opt(1990, 8, 2).expect("NaiveDate literal");
    let (data, _metadata) = read_rba_table(fetcher, CASH_RATE_TABLE)?;
    let column = data.column(CASH_RATE_SERIES).ok_or_else(|| {
        ReadAbsError::WithContextError(format!(
            "series '{CASH_RATE_SERIES}' not found in RBA table {CASH_RATE_TABLE}"
        ))
    })?;

    let mut series = Series::new("RBA Official Cash Rate", Vec::new(), Vec::new());
    for (period, value) in data.index().iter().zip(column.values.iter()) {
        if period.end() >= start {
            if let Some(value) = value {
                series.push(*period, *value);
            }
        }
    }

    let mut series = match monthly {
        true => series.to_frequency(Frequency::Monthly),
        false => series.to_frequency(Frequency::Daily),
    };

    // Carry the last published rate forward to today
    if let Some((last, value)) = series.last() {
        let today = Period::today(last.frequency());
        if last < today {
            series.push(today, value);
        }
    }

    Ok(series.reindex_filled())
}

/// Fetches a spreadsheet URL, retrying once with the sibling extension
/// (`.xls` <-> `.xlsx`) since the site occasionally mislabels files.
fn fetch_with_extension_fallback(
    fetcher: &dyn Fetcher,
    url: &str,
) -> Result<Vec<u8>, ReadAbsError> {
    match fetcher.get_file(url) {
        Ok(bytes) => Ok(bytes),
        Err(first) => match swap_extension(url) {
            Some(alternate) => {
                debug!(url, alternate = %alternate, "retrying with sibling extension");
                Ok(fetcher.get_file(&alternate)?)
            }
            None => Err(first.into()),
        },
    }
}

fn swap_extension(url: &str) -> Option<String> {
    let pattern = Regex::new(r"\.[^/]*$").expect("valid pattern");
    let replacement = match pattern.find(url)?.as_str() {
        ".xls" => ".xlsx",
        ".xlsx" => ".xls",
        _ => return None,
    };
    Some(pattern.replace(url, replacement).into_owned())
}

/// Transposes the metadata block: each data column becomes one metadata
/// row, with fields matched by the names in column 0. Columns without a
/// series identifier are dropped.
fn extract_metadata(grid: &Grid, table_code: &str, table_description: &str) -> Vec<SeriesMetadata> {
    let mut metadata = Vec::<SeriesMetadata>::new();
    for col in 1..grid.width() {
        let mut row = SeriesMetadata {
            table: table_code.to_string(),
            table_description: table_description.to_string(),
            ..SeriesMetadata::default()
        };
        for position in META_ROWS {
            let field = match grid.text(position, 0) {
                Some(field) => field,
                None => continue,
            };
            let value = grid.text(position, col).unwrap_or_default();
            match field.as_str() {
                FIELD_TITLE => row.description = value,
                FIELD_FREQUENCY => row.frequency = value,
                FIELD_TYPE => row.series_type = value,
                FIELD_UNITS => row.unit = value,
                FIELD_SERIES_ID | FIELD_MNEMONIC => row.series_id = value,
                _ => {}
            }
        }
        if !row.series_id.is_empty() {
            metadata.push(row);
        }
    }
    metadata
}

/// Reads the data block below the header row: series identifiers on the
/// header row, dates in the first column. Fully-empty columns are
/// dropped; the index frequency is inferred from the date gaps.
fn extract_data(grid: &Grid) -> Table {
    let mut ids = Vec::<(usize, String)>::new();
    for col in 1..grid.width() {
        if let Some(id) = grid.text(DATA_HEADER_ROW, col) {
            ids.push((col, id));
        }
    }

    let mut dates = Vec::<NaiveDate>::new();
    let mut rows = Vec::<Vec<Option<f64>>>::new();
    for row in DATA_HEADER_ROW + 1..grid.height() {
        let date = match grid.cell(row, 0).as_date() {
            Some(date) => date,
            None => continue,
        };
        dates.push(date);
        rows.push(
            ids.iter()
                .map(|(col, _)| grid.cell(row, *col).as_number())
                .collect(),
        );
    }

    let frequency = table::infer_frequency(&dates);
    let index = dates
        .into_iter()
        .map(|date| Period::from_date(date, Frequency::Daily))
        .collect();
    let columns = ids
        .into_iter()
        .enumerate()
        .map(|(position, (_, id))| Column {
            id,
            values: rows.iter().map(|values| values[position]).collect(),
        })
        .filter(|column| !column.is_all_missing())
        .collect();
    Table::build(index, columns).to_frequency(frequency)
}
