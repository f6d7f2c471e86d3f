use thiserror::Error;

/// Main error type for the readabs crate.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum ReadAbsError {
    #[error("{0}")]
    WithContextError(String),

    // Caller-input errors: raised before any fetching begins
    #[error("catalogue number '{0}' not found")]
    CatalogueMiss(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("parse entity '{0}' failed")]
    ParseEntityError(String),

    // Collaborator and extraction module errors
    #[error("{0}")]
    FetchError(#[from] crate::fetch::FetchError),

    #[error("{0}")]
    WorkbookError(#[from] crate::workbook::WorkbookError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ReadAbsError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ReadAbsError::WithContextError(format!("{}: {}", message, e)))
    }
}
