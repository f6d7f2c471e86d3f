//! Workbook and archive extraction for ABS releases.
//!
//! An ABS workbook carries an "Index" sheet describing every series,
//! followed by one or more "Data" sheets holding the observations. The
//! layout is a publisher convention, not a schema, so the positional
//! contract is collected into the constants below and everything layout
//! related fails soft: a file that does not match is skipped with a
//! warning and the rest of the request carries on.

use crate::error::ReadAbsError;
use crate::error::ResultMessage;
use crate::links;
use crate::metadata;
use crate::metadata::SeriesMetadata;
use crate::table::Column;
use crate::table::Frequency;
use crate::table::Period;
use crate::table::Table;
use crate::workbook::Grid;
use crate::workbook::Workbook;
use chrono::Datelike;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Cursor;
use std::io::Read;
use tracing::debug;
use tracing::warn;

/// Sheet carrying the per-series metadata block.
const INDEX_SHEET: &str = "Index";

/// Data sheets are recognised by name prefix.
const DATA_SHEET_PREFIX: &str = "Data";

// Layout contract for the Index sheet. Offsets are zero-based grid rows.
/// Candidate metadata header rows, probed in order.
const META_HEADER_OFFSETS: [usize; 2] = [9, 10];
/// Cell whose first whitespace token is the catalogue id.
const INDEX_CATALOGUE_CELL: (usize, usize) = (4, 1);
/// Cell whose text after the first '.' is the table description.
const INDEX_DESCRIPTION_CELL: (usize, usize) = (5, 1);

/// Layout contract for Data sheets: series ids on this row, observations
/// below, dates in the first column.
const DATA_HEADER_ROW: usize = 9;

/// Everything pulled out of one workbook.
pub(crate) struct Extraction {
    pub(crate) metadata: Vec<SeriesMetadata>,
    pub(crate) table: Table,
}

/// Extracts the metadata rows and the merged, period-indexed data table
/// from one ABS workbook. `Ok(None)` means the file does not follow the
/// expected layout and has been skipped with a warning.
pub(crate) fn extract_workbook(
    bytes: Vec<u8>,
    table_name: &str,
) -> Result<Option<Extraction>, ReadAbsError> {
    let mut workbook = Workbook::open(bytes)?;
    if !workbook.has_sheet(INDEX_SHEET) {
        warn!(table = table_name, "no '{INDEX_SHEET}' sheet, file not included");
        return Ok(None);
    }
    let index = workbook.grid(INDEX_SHEET)?;

    let catalogue_id = index
        .text(INDEX_CATALOGUE_CELL.0, INDEX_CATALOGUE_CELL.1)
        .and_then(|text| text.split_whitespace().next().map(str::to_string))
        .unwrap_or_default();
    let table_description = index
        .text(INDEX_DESCRIPTION_CELL.0, INDEX_DESCRIPTION_CELL.1)
        .map(|text| match text.split_once('.') {
            Some((_, rest)) => rest.trim().to_string(),
            None => text,
        })
        .unwrap_or_default();

    let metadata = match extract_metadata(&index, table_name, &table_description, &catalogue_id) {
        Some(metadata) => metadata,
        None => {
            warn!(
                catalogue = %catalogue_id,
                table = table_name,
                "could not find series metadata"
            );
            return Ok(None);
        }
    };

    let frequency_token = match resolve_frequency_token(&metadata) {
        Some(token) => token,
        None => {
            warn!(
                table = table_name,
                description = %table_description,
                "unrecognised data frequency"
            );
            return Ok(None);
        }
    };

    let (dates, table) = extract_data(&mut workbook, &metadata)?;
    let table = match table.is_empty() {
        true => table,
        false => table.to_frequency(frequency_token.anchored(&dates)),
    };

    Ok(Some(Extraction { metadata, table }))
}

/// Extracts every workbook inside an ABS zip archive. Entries that fail
/// to parse, or do not follow the expected layout, are skipped; a name
/// collision between entries renames the later table after its ordinal
/// position and restamps its metadata.
pub(crate) fn extract_archive(
    bytes: Vec<u8>,
) -> Result<(BTreeMap<String, Table>, Vec<SeriesMetadata>), ReadAbsError> {
    let mut zipped = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(ReadAbsError::from)
        .with_prefix("invalid zip archive")?;

    let mut tables = BTreeMap::<String, Table>::new();
    let mut all_metadata = Vec::<SeriesMetadata>::new();
    for position in 0..zipped.len() {
        let (entry_name, entry_bytes) = {
            let mut entry = zipped.by_index(position)?;
            let mut entry_bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut entry_bytes)?;
            (entry.name().to_string(), entry_bytes)
        };
        let mut table_name = links::table_name(&entry_name);

        let mut extraction = match extract_workbook(entry_bytes, &table_name) {
            Ok(Some(extraction)) => extraction,
            Ok(None) => continue,
            Err(error) => {
                warn!(entry = %entry_name, %error, "skipping unreadable archive entry");
                continue;
            }
        };

        // ABS occasionally reuses table numbers across files
        if tables.contains_key(&table_name) {
            let renamed = format!("{table_name}-{position}");
            debug!(from = %table_name, to = %renamed, "renaming duplicate table");
            for row in &mut extraction.metadata {
                row.table = renamed.clone();
            }
            table_name = renamed;
        }

        all_metadata.extend(extraction.metadata);
        tables.insert(table_name, extraction.table);
    }
    Ok((tables, all_metadata))
}

/// Locates and parses the metadata block on the Index sheet, probing each
/// candidate header offset in turn. `None` means no offset produced the
/// required column set.
fn extract_metadata(
    index: &Grid,
    table_name: &str,
    table_description: &str,
    catalogue_id: &str,
) -> Option<Vec<SeriesMetadata>> {
    let (offset, columns) = META_HEADER_OFFSETS
        .iter()
        .find_map(|&offset| Some((offset, header_columns(index, offset)?)))?;

    // Drop the first data row and the two trailer rows below the block
    let first = offset + 2;
    let last = index.height().checked_sub(2)?;
    let mut rows = Vec::<SeriesMetadata>::new();
    for row in first..last {
        let text = |header: &str| {
            columns
                .get(header)
                .and_then(|&col| index.text(row, col))
                .unwrap_or_default()
        };
        let date = |header: &str| {
            columns
                .get(header)
                .and_then(|&col| index.cell(row, col).as_date())
        };
        let series_id = text(metadata::HEADER_SERIES_ID);
        if series_id.is_empty() {
            continue;
        }
        rows.push(SeriesMetadata {
            description: text(metadata::HEADER_DESCRIPTION),
            series_id,
            series_type: text(metadata::HEADER_SERIES_TYPE),
            unit: metadata::normalise_unit(&text(metadata::HEADER_UNIT)),
            data_type: text(metadata::HEADER_DATA_TYPE),
            frequency: text(metadata::HEADER_FREQUENCY),
            table: table_name.trim().to_string(),
            table_description: table_description.trim().to_string(),
            catalogue_id: catalogue_id.trim().to_string(),
            series_start: date(metadata::HEADER_SERIES_START),
            series_end: date(metadata::HEADER_SERIES_END),
            observations: columns
                .get(metadata::HEADER_OBSERVATIONS)
                .and_then(|&col| index.cell(row, col).as_number())
                .map(|count| count as usize),
        });
    }
    match rows.is_empty() {
        true => None,
        false => Some(rows),
    }
}

/// Reads the header texts on one candidate row; accepted only when every
/// required metadata field is present.
fn header_columns(index: &Grid, offset: usize) -> Option<HashMap<String, usize>> {
    let mut columns = HashMap::<String, usize>::new();
    for col in 0..index.width() {
        if let Some(header) = index.text(offset, col) {
            columns.entry(header).or_insert(col);
        }
    }
    let complete = metadata::REQUIRED_HEADERS
        .iter()
        .all(|required| columns.contains_key(*required));
    match complete {
        true => Some(columns),
        false => None,
    }
}

/// The declared frequency of a workbook, before the period anchor month
/// is known.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FrequencyToken {
    Monthly,
    Quarterly,
    Yearly,
}

impl FrequencyToken {
    /// Qualifies quarterly and yearly data with the anchor month observed
    /// in the data itself (the latest calendar month in the index).
    fn anchored(self, dates: &[NaiveDate]) -> Frequency {
        let anchor = dates.iter().map(NaiveDate::month).max().unwrap_or(12);
        match self {
            FrequencyToken::Monthly => Frequency::Monthly,
            FrequencyToken::Quarterly => Frequency::Quarterly(anchor),
            FrequencyToken::Yearly => Frequency::Yearly(anchor),
        }
    }
}

/// All metadata rows of one workbook must agree on a single recognised
/// frequency token; anything else skips the whole table.
fn resolve_frequency_token(metadata: &[SeriesMetadata]) -> Option<FrequencyToken> {
    let mut tokens: Vec<String> = metadata
        .iter()
        .map(|row| row.frequency.trim().to_lowercase())
        .collect();
    tokens.sort();
    tokens.dedup();
    match tokens.as_slice() {
        [token] => match token.as_str() {
            "month" => Some(FrequencyToken::Monthly),
            "quarter" | "biannual" => Some(FrequencyToken::Quarterly),
            "annual" => Some(FrequencyToken::Yearly),
            _ => None,
        },
        _ => None,
    }
}

/// Merges every Data sheet into one wide, date-indexed table. Returns the
/// distinct observation dates alongside, for anchoring the period index.
fn extract_data(
    workbook: &mut Workbook,
    metadata: &[SeriesMetadata],
) -> Result<(Vec<NaiveDate>, Table), ReadAbsError> {
    let data_sheets: Vec<String> = workbook
        .sheet_names()
        .iter()
        .filter(|name| name.starts_with(DATA_SHEET_PREFIX))
        .map(|name| name.to_string())
        .collect();

    let mut merged = Table::default();
    for sheet_name in data_sheets {
        let grid = workbook.grid(&sheet_name)?;
        merged = merged.outer_merge(data_sheet_table(&grid));
    }

    for column in merged.columns() {
        if column.is_all_missing() {
            // Correlate the empty series back to its metadata row
            let details = metadata.iter().find(|row| row.series_id == column.id);
            warn!(
                series = %column.id,
                description = details.map(|row| row.description.as_str()).unwrap_or(""),
                table = details.map(|row| row.table.as_str()).unwrap_or(""),
                series_type = details.map(|row| row.series_type.as_str()).unwrap_or(""),
                "data series is all missing"
            );
        }
    }

    let dates: Vec<NaiveDate> = merged.index().iter().map(Period::end).collect();
    Ok((dates, merged))
}

/// Parses one Data sheet: series ids on the header row, dates in the
/// first column, observations below. Undated and fully-empty rows are
/// dropped.
fn data_sheet_table(grid: &Grid) -> Table {
    let mut ids = Vec::<(usize, String)>::new();
    for col in 1..grid.width() {
        if let Some(id) = grid.text(DATA_HEADER_ROW, col) {
            ids.push((col, id));
        }
    }

    let mut index = Vec::<Period>::new();
    let mut rows = Vec::<Vec<Option<f64>>>::new();
    for row in DATA_HEADER_ROW + 1..grid.height() {
        let date = match grid.cell(row, 0).as_date() {
            Some(date) => date,
            None => continue,
        };
        let values: Vec<Option<f64>> = ids
            .iter()
            .map(|(col, _)| grid.cell(row, *col).as_number())
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        index.push(Period::from_date(date, Frequency::Daily));
        rows.push(values);
    }

    let columns = ids
        .into_iter()
        .enumerate()
        .map(|(position, (_, id))| Column {
            id,
            values: rows.iter().map(|values| values[position]).collect(),
        })
        .collect();
    Table::build(index, columns)
}
