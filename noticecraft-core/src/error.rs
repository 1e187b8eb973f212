//! Error type shared by the reader, the index builder and the writer

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = NoticeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NoticeError {
    /// The workbook could not be opened or decoded
    #[error("failed to open workbook {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("unsupported spreadsheet format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("workbook {} has no worksheets", .0.display())]
    EmptyWorkbook(PathBuf),

    /// An arrangement table lacks one of the required header fields
    #[error("\"{source_label}\" has no \"{field}\" column, fix the header row and run again")]
    MissingRequiredField { source_label: String, field: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A part of the OOXML package is missing or not shaped as expected
    #[error("malformed package part {part}: {message}")]
    Package { part: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl NoticeError {
    pub(crate) fn package(part: impl Into<String>, message: impl Into<String>) -> Self {
        NoticeError::Package {
            part: part.into(),
            message: message.into(),
        }
    }
}
