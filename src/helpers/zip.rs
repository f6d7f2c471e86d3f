//! ZIP access helpers for xlsx containers held in memory.

use crate::error::ReadAbsError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Convenience accessors over a `ZipArchive`.
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Looks up an archive member by name, ignoring case and normalising
    /// backslash separators. A missing member is `Ok(None)`.
    fn member(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ReadAbsError>;

    /// Opens an archive member as an XML event reader.
    fn xml_member(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ReadAbsError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn member(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ReadAbsError> {
        let pattern = name.replace('\\', "/");
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_member(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ReadAbsError> {
        let reader = self
            .member(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}
