use thiserror::Error;

/// Errors raised while reading, transforming or exporting casts.
#[derive(Debug, Error)]
pub enum CtdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Malformed row; `line` is 1-based.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Missing column: '{0}'")]
    MissingColumn(String),

    #[error("Missing metadata: '{0}'")]
    MissingMetadata(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Cast has no timestamps")]
    MissingTimestamps,

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Length mismatch: {what} has {got} values, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid pressure {0}")]
    InvalidPressure(f64),

    #[error("Pressure span {min} .. {max} dBar needs too many bins of {width} dBar")]
    PressureSpan { min: f64, max: f64, width: f64 },

    #[error("Invalid bin width {0}")]
    InvalidBinWidth(f64),

    #[error("Unsupported file extension: .{0}")]
    UnsupportedFormat(String),
}

impl CtdError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        CtdError::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CtdError>;
