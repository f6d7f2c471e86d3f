//! Shared fixture builders for unit tests: in-memory xlsx workbooks, zip
//! archives and a canned-response [`Fetcher`].

use crate::fetch::FetchError;
use crate::fetch::Fetcher;
use crate::workbook::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builds a zip archive from (entry name, bytes) pairs.
pub(crate) fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds an xlsx container from raw XML parts, for tests that exercise
/// specific corners of the format.
pub(crate) fn xlsx_raw(parts: &[(&str, &str)]) -> Vec<u8> {
    let entries: Vec<(&str, &[u8])> = parts
        .iter()
        .map(|(name, xml)| (*name, xml.as_bytes()))
        .collect();
    zip_archive(&entries)
}

/// Builds a well-formed xlsx workbook from (sheet name, rows) pairs.
/// Text lands as inline strings, dates as ISO cells, so no shared-string
/// or styles parts are needed.
pub(crate) fn xlsx(sheets: &[(&str, Vec<Vec<Value>>)]) -> Vec<u8> {
    let mut parts: Vec<(String, String)> = Vec::new();

    let mut sheet_tags = String::new();
    let mut relationship_tags = String::new();
    for (position, (name, rows)) in sheets.iter().enumerate() {
        let number = position + 1;
        sheet_tags.push_str(&format!(
            r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#,
            escape_xml(name)
        ));
        relationship_tags.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#,
        ));
        parts.push((
            format!("xl/worksheets/sheet{number}.xml"),
            sheet_xml(rows),
        ));
    }

    parts.push((
        "xl/workbook.xml".to_string(),
        format!(
            r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_tags}</sheets></workbook>"#
        ),
    ));
    parts.push((
        "xl/_rels/workbook.xml.rels".to_string(),
        format!(
            r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationship_tags}</Relationships>"#
        ),
    ));

    let borrowed: Vec<(&str, &str)> = parts
        .iter()
        .map(|(name, xml)| (name.as_str(), xml.as_str()))
        .collect();
    xlsx_raw(&borrowed)
}

fn sheet_xml(rows: &[Vec<Value>]) -> String {
    let mut body = String::new();
    for (row_index, row) in rows.iter().enumerate() {
        body.push_str(&format!(r#"<row r="{}">"#, row_index + 1));
        for (col_index, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(col_index), row_index + 1);
            match value {
                Value::Empty => {}
                Value::Number(number) => {
                    body.push_str(&format!(r#"<c r="{reference}"><v>{number}</v></c>"#));
                }
                Value::Bool(flag) => {
                    body.push_str(&format!(
                        r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                        if *flag { 1 } else { 0 }
                    ));
                }
                Value::Date(date) => {
                    body.push_str(&format!(
                        r#"<c r="{reference}" t="d"><v>{}</v></c>"#,
                        date.format("%Y-%m-%d")
                    ));
                }
                Value::Text(text) => {
                    body.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape_xml(text)
                    ));
                }
            }
        }
        body.push_str("</row>");
    }
    format!(r#"<?xml version="1.0"?><worksheet><sheetData>{body}</sheetData></worksheet>"#)
}

/// Zero-based column index to spreadsheet letters (0 -> A, 26 -> AA).
fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Canned-response fetcher counting how often it is asked, so tests can
/// assert both the bytes served and that caching short-circuits fetches.
/// Clones share the call counter, so a handle kept outside a boxed copy
/// still observes its traffic.
#[derive(Clone, Default)]
pub(crate) struct FakeFetcher {
    responses: HashMap<String, Vec<u8>>,
    calls: Rc<Cell<usize>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> FakeFetcher {
        FakeFetcher::default()
    }

    pub(crate) fn with(mut self, url: &str, bytes: Vec<u8>) -> FakeFetcher {
        self.responses.insert(url.to_string(), bytes);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Fetcher for FakeFetcher {
    fn get_file(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Http {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
    }

    #[test]
    fn test_fake_fetcher_counts_calls() {
        let fetcher = FakeFetcher::new().with("https://example.test/a", vec![1, 2]);
        assert_eq!(fetcher.get_file("https://example.test/a").unwrap(), vec![1, 2]);
        assert!(fetcher.get_file("https://example.test/b").is_err());
        assert_eq!(fetcher.calls(), 2);
    }
}
