use std::io;

use thiserror::Error;

pub type AggregateResult<T> = Result<T, AggregateError>;

/// Caller-supplied configuration that cannot run.
///
/// Reported before any byte of the source is read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("select at least one column to sum")]
    EmptySelection,
    #[error("batch size must be positive")]
    ZeroBatchSize,
    #[error("sample size must be positive")]
    ZeroSampleRows,
    #[error("column {0:?} is selected more than once")]
    DuplicateTarget(String),
    #[error("separator {separator:?} is used for more than one purpose")]
    SeparatorConflict { separator: char },
    #[error("unsupported text encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("invalid field delimiter {0:?}")]
    InvalidDelimiter(char),
}

/// Failure surfaced by a batch source.
///
/// Parse and decode failures are kept apart from I/O failures so callers can suggest different
/// remedies (check the file vs. change the delimiter/encoding).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("parse error at row {row}: {reason}")]
    Parse { row: u64, reason: String },
    #[error("cannot decode row {row}, column {column} as {encoding}")]
    Encoding {
        row: u64,
        column: u64,
        encoding: &'static str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaErrorKind {
    EmptyInput,
    ParseFailure,
    EncodingFailure,
    Io,
}

/// The prefix of a source could not be probed.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("input is empty")]
    EmptyInput,
    #[error("parse error at row {row}: {reason}")]
    Parse { row: u64, reason: String },
    #[error("cannot decode row {row}, column {column} as {encoding}")]
    Encoding {
        row: u64,
        column: u64,
        encoding: &'static str,
    },
    #[error(transparent)]
    Io(io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchemaError {
    /// Coarse classification used when choosing a remediation hint.
    ///
    /// Configuration problems are reported as parse failures: they come from the same locale
    /// options a parse failure would ask the user to change.
    pub fn kind(&self) -> SchemaErrorKind {
        match self {
            SchemaError::EmptyInput => SchemaErrorKind::EmptyInput,
            SchemaError::Parse { .. } | SchemaError::Config(_) => SchemaErrorKind::ParseFailure,
            SchemaError::Encoding { .. } => SchemaErrorKind::EncodingFailure,
            SchemaError::Io(_) => SchemaErrorKind::Io,
        }
    }
}

impl From<SourceError> for SchemaError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Io(err) => SchemaError::Io(err),
            SourceError::Parse { row, reason } => SchemaError::Parse { row, reason },
            SourceError::Encoding {
                row,
                column,
                encoding,
            } => SchemaError::Encoding {
                row,
                column,
                encoding,
            },
        }
    }
}

/// Fatal failure of an aggregation run. No partial result accompanies it.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `batch` is 1-based; 0 means the column is not in the source header.
    #[error("column {column:?} is missing from {}", absent_from(.batch))]
    ColumnAbsent { column: String, batch: u64 },
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The header of the source could not be read.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn absent_from(batch: &u64) -> String {
    if *batch == 0 {
        "the header".to_string()
    } else {
        format!("batch {batch}")
    }
}

impl AggregateError {
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            AggregateError::Source(SourceError::Io(_)) | AggregateError::Schema(SchemaError::Io(_))
        )
    }
}

impl From<io::Error> for AggregateError {
    fn from(err: io::Error) -> Self {
        AggregateError::Source(SourceError::Io(err))
    }
}
