//! XML reading utilities shared by the xlsx workbook parser.
//! Wraps quick-xml with a configuration suited to spreadsheet part files
//! and provides helpers for attribute access and text accumulation.

use crate::error::ReadAbsError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;

/// XML reader with a reusable event buffer.
/// End-name checking is disabled; the OOXML parts we read are machine written.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event, returning `None` at end of input.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, ReadAbsError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(ReadAbsError::XmlError(error)),
        }
    }
}

/// Attribute access on start tags.
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an unescaped attribute value by name.
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ReadAbsError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ReadAbsError> {
        self.try_get_attribute(name)?
            .map(|attribute| Ok(attribute.unescape_value()?))
            .transpose()
    }
}

/// Text accumulation from entity/character reference events.
pub(crate) trait XmlTextHelper {
    /// Appends the text that a `BytesRef` event resolves to.
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ReadAbsError>;
}

impl XmlTextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ReadAbsError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push_str(character.encode_utf8(&mut [0u8; 4]));
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            return Err(ReadAbsError::ParseEntityError(raw.to_string()));
        }

        Ok(())
    }
}

/// Event loop over an `XmlReader`: runs the given match arms for each event
/// until end of input, ignoring everything unmatched.
#[macro_export]
macro_rules! xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_text(xml: &str) -> Result<String, ReadAbsError> {
        let mut reader = XmlReader::new(std::io::BufReader::new(xml.as_bytes()));
        let mut text = String::new();
        xml_events!(reader => {
            Event::Text(event) => text.push_str(&event.xml_content()?),
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });
        Ok(text)
    }

    #[test]
    fn test_character_references() {
        assert_eq!(collect_text("<t>&#65;&#x42;</t>").unwrap(), "AB");
        assert_eq!(collect_text("<t>a &amp; b</t>").unwrap(), "a & b");
    }

    #[test]
    fn test_reader_attribute_access() {
        let xml = r#"<sheet name="Data1" sheetId="1"/>"#;
        let mut reader = XmlReader::new(std::io::BufReader::new(xml.as_bytes()));
        let mut found = None;
        while let Some(event) = reader.next().unwrap() {
            if let Event::Start(event) = event {
                found = event
                    .get_attribute_value("name")
                    .unwrap()
                    .map(|value| value.to_string());
            }
        }
        assert_eq!(found.as_deref(), Some("Data1"));
    }
}
