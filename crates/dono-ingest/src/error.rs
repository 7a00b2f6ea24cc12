//! Error types for object-file ingestion

use chrono::NaiveDate;
use dono_common::CurrencySign;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// A run-fatal ingestion failure
#[derive(Error, Debug)]
pub enum IngestError {
    /// The source text does not follow the object-file grammar or the
    /// payroll schema
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A donation was still waiting for an exchange rate when the stream ended
    #[error("No conversion rate for {sign} on {}", display_date(.date))]
    Integrity {
        sign: CurrencySign,
        date: Option<NaiveDate>,
    },

    /// The sink rejected a write or a lookup
    #[error("Persistence failure: {0:#}")]
    Persistence(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Line number the failure points at, when it has one
    pub fn line(&self) -> Option<usize> {
        match self {
            IngestError::Format(e) => Some(e.line()),
            _ => None,
        }
    }
}

/// Malformed input, always tied to a source line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid offset on line {line}: {spaces} leading spaces is not a multiple of {unit}")]
    IndentStep { line: usize, spaces: usize, unit: usize },

    #[error("Invalid offset on line {line}: depth {depth} under {open} open object(s)")]
    IndentJump { line: usize, depth: usize, open: usize },

    #[error("Malformed line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("Invalid object name format {name:?} on line {line}")]
    InvalidObjectName { line: usize, name: String },

    #[error("Attribute {key:?} on line {line} has no open object")]
    OrphanAttribute { line: usize, key: String },

    #[error("{object} on line {line}: {reason}")]
    Record {
        object: String,
        line: usize,
        reason: String,
    },
}

impl FormatError {
    pub fn line(&self) -> usize {
        match self {
            FormatError::IndentStep { line, .. }
            | FormatError::IndentJump { line, .. }
            | FormatError::MalformedLine { line, .. }
            | FormatError::InvalidObjectName { line, .. }
            | FormatError::OrphanAttribute { line, .. }
            | FormatError::Record { line, .. } => *line,
        }
    }
}

fn display_date(date: &Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.to_string(),
        None => "an invalid date".to_string(),
    }
}
