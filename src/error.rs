//! Error types for the import engine.
//!
//! [`ImportError`] is what a run surfaces to its caller. Every fatal variant is
//! also mirrored as a line in the run's message log, so the message log stays
//! the user-facing record even when the caller only inspects the `Err`.
//!
//! [`ConversionError`] is produced by value converters and LOB decoders and is
//! absorbed at the field boundary unless the error policy escalates it.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that end an import run (or prevent one from starting).
#[derive(Debug, Error)]
pub enum ImportError {
    /// Invalid or contradictory parser configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The configured line filter or column filter is not a valid regex
    #[error("Invalid regular expression '{pattern}'")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Unknown character encoding label
    #[error("Unknown encoding '{label}'")]
    UnknownEncoding { label: String },

    /// A header line was expected but the input is empty
    #[error("Input {source_name} is empty but a header line was expected")]
    MissingHeader { source_name: String },

    /// Strict mapping is active and a source column has no destination
    #[error("Column '{column}' not found in target table '{table}'")]
    ColumnNotFound { column: String, table: String },

    /// Mapping resolution produced nothing to import
    #[error("No columns of {source_name} could be mapped to target table '{table}'")]
    NoColumnsMapped { source_name: String, table: String },

    /// Reading or (re)opening the input failed
    #[error("I/O error while {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A field could not be decoded and the error policy requested an abort
    #[error("Line {line}, column '{column}': could not convert '{value}'")]
    Conversion {
        line: usize,
        column: String,
        value: String,
        #[source]
        source: ConversionError,
    },

    /// A record could not be tokenized and the error policy requested an abort
    #[error("Line {line}: malformed record: {message}")]
    MalformedRecord { line: usize, message: String },

    /// The row sink or schema provider failed
    #[error("{context}")]
    Sink {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ImportError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ImportError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        ImportError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn sink(context: impl Into<String>, source: anyhow::Error) -> Self {
        ImportError::Sink {
            context: context.into(),
            source: source.into(),
        }
    }

    /// True for errors raised before any row was read.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ImportError::Configuration { .. }
                | ImportError::InvalidRegex { .. }
                | ImportError::UnknownEncoding { .. }
                | ImportError::ColumnNotFound { .. }
                | ImportError::NoColumnsMapped { .. }
                | ImportError::MissingHeader { .. }
        )
    }
}

/// Failure to turn one raw field into a typed value.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("'{value}' is not a valid {target}")]
    InvalidValue { value: String, target: String },

    #[error("invalid {encoding} payload: {reason}")]
    InvalidEncoding { encoding: &'static str, reason: String },

    #[error("could not read LOB file {path:?}")]
    LobFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConversionError {
    pub(crate) fn invalid(value: &str, target: impl Into<String>) -> Self {
        ConversionError::InvalidValue {
            value: value.to_string(),
            target: target.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
