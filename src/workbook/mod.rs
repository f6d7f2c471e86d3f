//! Minimal xlsx workbook reader over in-memory bytes.
//!
//! Parses the workbook structure (sheet list, shared strings, number
//! formats for date detection) with quick-xml over the zip container and
//! exposes each sheet as a dense [`Grid`] of decoded [`Value`]s. Only the
//! parts the ABS/RBA extractors need are implemented; formulas, styles
//! beyond date formats and non-xlsx formats are out of scope.

pub(crate) mod cell;

use crate::error::ReadAbsError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::xml_events;
use cell::parse_iso_date;
use cell::serial_to_date;
use cell::CellType;
pub use cell::Value;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Cursor;
use thiserror::Error;
use zip::ZipArchive;

// XML tag names (local parts) used while parsing xlsx parts
const TAG_RELATIONSHIP: &[u8] = b"Relationship"; // workbook relationships
const TAG_SHEET: &[u8] = b"sheet"; //              worksheet definition
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts"; //   custom number formats container
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs"; //   cell format indexes container
const TAG_FORMAT_INDEX: &[u8] = b"xf";
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";
const TAG_PHONETIC_TEXT: &[u8] = b"rPh"; //        phonetic annotations, skipped
const TAG_TEXT: &[u8] = b"t";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

/// Errors raised while opening or reading an xlsx workbook.
#[derive(Error, Debug)]
pub enum WorkbookError {
    /// The bytes are not a readable xlsx container (includes `.xls` payloads)
    #[error("invalid xlsx workbook: {0}")]
    InvalidWorkbook(String),

    /// A required part of the container is absent
    #[error("missing workbook part '{0}'")]
    MissingPart(String),

    /// The requested sheet does not exist
    #[error("sheet '{0}' not found")]
    SheetNotFound(String),
}

/// An opened xlsx workbook held fully in memory.
pub struct Workbook {
    zip: ZipArchive<Cursor<Vec<u8>>>,
    /// Worksheets as (name, zip path) pairs, in workbook order
    sheets: Vec<(String, String)>,
    /// Cell format index -> cell type, for serial-date detection
    number_formats: Vec<CellType>,
    shared_strings: Vec<String>,
}

impl Workbook {
    /// Opens a workbook from raw bytes.
    pub fn open(bytes: Vec<u8>) -> Result<Workbook, ReadAbsError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|error| WorkbookError::InvalidWorkbook(error.to_string()))?;
        let relationships = load_relationships(&mut zip)?;
        let (sheets, is_1904) = load_workbook(&mut zip, &relationships)?;
        if sheets.is_empty() {
            Err(WorkbookError::InvalidWorkbook("workbook has no sheets".to_string()))?;
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(Workbook {
            zip,
            sheets,
            number_formats,
            shared_strings,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|(sheet, _)| sheet == name)
    }

    /// Reads a sheet into a dense grid of decoded values.
    pub fn grid(&mut self, name: &str) -> Result<Grid, ReadAbsError> {
        let path = self
            .sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_string()))?;

        let shared_strings = &self.shared_strings;
        let number_formats = &self.number_formats;
        let mut reader = self
            .zip
            .xml_member(&path)?
            .ok_or_else(|| WorkbookError::MissingPart(path.clone()))?;

        let mut cells = Vec::<(usize, usize, Value)>::new();
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut raw = String::new();
        xml_events!(reader => {
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
                row_count += 1;
                col_count = 0;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count += 1;
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::InlineString,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if kind == CellType::Number {
                    if let Some(format_id) = event.get_attribute_value("s")? {
                        if !format_id.is_empty() {
                            let index = format_id.parse::<usize>()?;
                            if let Some(format) = number_formats.get(index) {
                                kind = *format;
                            }
                        }
                    }
                }
                raw.clear();
            }
            Event::Start(event) if kind != CellType::Empty && event.local_name().as_ref() == TAG_INLINE_STRING => {
                raw = read_text(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.local_name().as_ref() == TAG_VALUE => {
                raw = read_text(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if kind != CellType::Empty && !raw.is_empty() && event.local_name().as_ref() == TAG_CELL => {
                let value = decode_value(kind, &raw, shared_strings);
                if !matches!(value, Value::Empty) {
                    cells.push((row, col, value));
                }
                raw.clear();
            }
        });

        Ok(Grid::from_cells(cells))
    }
}

/// A dense, row-major view of one sheet.
#[derive(Clone, Debug, Default)]
pub struct Grid {
    rows: Vec<Vec<Value>>,
}

static EMPTY_CELL: Value = Value::Empty;

impl Grid {
    fn from_cells(cells: Vec<(usize, usize, Value)>) -> Grid {
        let height = cells.iter().map(|(row, _, _)| row + 1).max().unwrap_or(0);
        let width = cells.iter().map(|(_, col, _)| col + 1).max().unwrap_or(0);
        let mut rows = vec![vec![Value::Empty; width]; height];
        for (row, col, value) in cells {
            rows[row][col] = value;
        }
        Grid { rows }
    }

    /// Number of rows, counting trailing empty ones up to the last cell.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|row| row.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, col); out-of-range positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Value {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Trimmed text content of a cell, `None` when empty.
    pub fn text(&self, row: usize, col: usize) -> Option<String> {
        self.cell(row, col).as_text()
    }

    pub fn row(&self, row: usize) -> &[Value] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Converts an A1-style reference to zero-based (row, col) indexes.
fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for letter in letters.chars() {
        if !letter.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// Decodes a raw cell payload according to its classified type.
fn decode_value(kind: CellType, raw: &str, shared_strings: &[String]) -> Value {
    match kind {
        CellType::Empty | CellType::Error => Value::Empty,
        CellType::Boolean => Value::Bool(raw == "1" || raw.eq_ignore_ascii_case("true")),
        CellType::Number => match raw.trim().parse::<f64>() {
            Ok(number) => Value::Number(number),
            Err(_) => Value::Text(raw.to_string()),
        },
        CellType::NumberDate1900 | CellType::NumberDate1904 => {
            let is_1904 = kind == CellType::NumberDate1904;
            match raw.trim().parse::<f64>().ok().and_then(|serial| serial_to_date(serial, is_1904)) {
                Some(date) => Value::Date(date),
                None => Value::Empty,
            }
        }
        CellType::IsoDateTime => match parse_iso_date(raw.trim()) {
            Some(date) => Value::Date(date),
            None => Value::Text(raw.to_string()),
        },
        CellType::InlineString => Value::Text(raw.to_string()),
        CellType::SharedString => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| shared_strings.get(index))
            .map(|text| Value::Text(text.clone()))
            .unwrap_or(Value::Empty),
    }
}

/// Loads worksheet relationships, mapping relationship IDs to zip paths.
fn load_relationships(
    zip: &mut ZipArchive<Cursor<Vec<u8>>>,
) -> Result<HashMap<String, String>, ReadAbsError> {
    let path = "xl/_rels/workbook.xml.rels";
    let mut reader = zip
        .xml_member(path)?
        .ok_or_else(|| WorkbookError::MissingPart(path.to_string()))?;
    let mut relationships = HashMap::<String, String>::new();
    xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheet relationships matter
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Reads the workbook part: the ordered sheet list and the date epoch flag.
fn load_workbook(
    zip: &mut ZipArchive<Cursor<Vec<u8>>>,
    relationships: &HashMap<String, String>,
) -> Result<(Vec<(String, String)>, bool), ReadAbsError> {
    let path = "xl/workbook.xml";
    let mut reader = zip
        .xml_member(path)?
        .ok_or_else(|| WorkbookError::MissingPart(path.to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads the shared string table; absent part means no shared strings.
fn load_shared_strings(
    zip: &mut ZipArchive<Cursor<Vec<u8>>>,
) -> Result<Vec<String>, ReadAbsError> {
    let mut reader = match zip.xml_member("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };
    let mut shared_strings = Vec::<String>::new();
    xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_text(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Loads cell formats from styles.xml and classifies each as date or number.
/// An absent styles part leaves every numeric cell a plain number.
fn load_number_formats(
    zip: &mut ZipArchive<Cursor<Vec<u8>>>,
    is_1904: bool,
) -> Result<Vec<CellType>, ReadAbsError> {
    let mut reader = match zip.xml_member("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => {
            custom_formats_context = true;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => {
            custom_formats_context = false;
        }
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let kind = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), kind);
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => {
            format_indexes_context = true;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => {
            format_indexes_context = false;
        }
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            if let Some(id) = event.get_attribute_value("numFmtId")? {
                format_indexes.push(id.to_string());
            }
        }
    });

    let number_formats = format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect();
    Ok(number_formats)
}

/// Normalises a relationship target to a path inside the zip container.
fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix("/xl/") {
        format!("xl/{stripped}")
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Accumulates the string content under an element, skipping phonetic
/// annotations and resolving entity references.
fn read_text<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, ReadAbsError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
