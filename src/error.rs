use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the data layer.
///
/// Parse-local problems (one bad line, one unreadable token) never surface
/// here; they are logged and counted by the readers. Everything in this enum
/// aborts the whole operation and leaves the previously loaded dataset intact.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("couldn't open {path}: {source}")]
    FileNotOpenable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header line is longer than {limit} bytes")]
    HeaderTooLong { limit: usize },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("insufficient number of columns ({found}), check delimiter and 'commented labels' setting")]
    TooFewColumns { found: usize },

    #[error("too many data columns ({found} > {limit})")]
    TooManyColumns { found: usize, limit: usize },

    #[error("too many rows of data ({found} > {limit})")]
    TooManyRows { found: usize, limit: usize },

    #[error("array sizes old ({old_rows}x{old_cols}) vs new ({new_rows}x{new_cols}) don't match")]
    RowColumnMismatch {
        old_rows: usize,
        old_cols: usize,
        new_rows: usize,
        new_cols: usize,
    },

    #[error("insufficient data: {columns} columns x {rows} rows")]
    InsufficientData { columns: usize, rows: usize },

    #[error("too much unreadable data: {unreadable} of {examined} lines near line {line}")]
    UnreadableDataThreshold {
        unreadable: usize,
        examined: usize,
        line: usize,
    },

    #[error("data ended early: {0}")]
    Truncated(String),

    #[error("row-major binary input requires the number of points to be known in advance")]
    RowMajorNeedsPointCount,

    #[error("no ASCII table extension found in FITS file")]
    FitsHduNotFound,

    #[error("FITS table column {index} not found: {detail}")]
    FitsColumnNotFound { index: usize, detail: String },

    #[error("selection arrays aren't consistent: expected {expected} entries, found {found}")]
    SelectionArrayLengthMismatch { expected: usize, found: usize },

    #[error("deleting these columns would leave only {remaining}")]
    TooFewSurvivingColumns { remaining: usize },

    #[error("unknown normalization style '{0}'")]
    UnknownNormalization(String),

    #[error("column index {index} out of range ({count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    #[error("no dataset is loaded")]
    NoDataset,
}

pub type DataResult<T> = Result<T, DataError>;
