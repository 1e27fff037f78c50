//! Error types for dm-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dm-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension is not one of the accepted formats
    #[error("unsupported file format for '{file}' (expected csv, xlsx, xls, tsv or txt)")]
    UnsupportedFormat { file: String },

    /// File could not be decoded or parsed into a table
    #[error("failed to load '{file}': {message}")]
    Load { file: String, message: String },

    /// A loaded file has a header but no data rows
    #[error("'{table}' appears to be empty or could not be read properly")]
    EmptyTable { table: String },

    /// The join key column is missing from a table
    #[error("{column} column not found in '{table}' (available columns: {available})")]
    MissingKeyColumn {
        column: String,
        table: String,
        available: String,
    },

    /// A transform step referenced a column that does not exist
    #[error("unknown column '{column}' in '{table}'")]
    UnknownColumn { column: String, table: String },

    /// Two columns would end up with the same name after renaming
    #[error("rename would produce duplicate column name '{name}'")]
    NameCollision { name: String },

    /// Column selection was empty
    #[error("at least one column must be selected")]
    EmptySelection,

    /// A filter value could not be coerced to the column's type
    #[error("invalid filter value '{value}' for column '{column}': expected {expected}")]
    InvalidFilterValue {
        column: String,
        value: String,
        expected: String,
    },

    /// Serialization of the final table failed
    #[error("export failed on column '{column}': {message}")]
    Export { column: String, message: String },

    /// Writing the output container failed
    #[error("failed to write {format} output: {message}")]
    ExportWrite { format: String, message: String },

    /// A workflow step ran before the step it depends on
    #[error("{0} must be completed first")]
    NotReady(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn load(file: &str, message: impl Into<String>) -> Self {
        Error::Load {
            file: file.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn export(column: &str, message: impl std::fmt::Display) -> Self {
        Error::Export {
            column: column.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn export_write(format: &str, message: impl std::fmt::Display) -> Self {
        Error::ExportWrite {
            format: format.to_string(),
            message: message.to_string(),
        }
    }

    /// Remediation tip shown next to the error, if one applies
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::MissingKeyColumn { .. } => Some(
                "Make sure both files have a column named exactly 'UPC' (case-sensitive)",
            ),
            Error::Load { message, .. } if message.contains("Excel") => {
                Some("Try saving your Excel file as CSV format if the issue persists")
            }
            Error::Load { message, .. } if message.contains("encoding") => {
                Some("Try saving your file with UTF-8 encoding")
            }
            Error::Load { message, .. } if message.contains("separator") => {
                Some("Use a comma, tab, semicolon or pipe between columns")
            }
            Error::EmptySelection => Some("Select at least one column to continue"),
            _ => None,
        }
    }
}
