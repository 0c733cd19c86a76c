//! Error types for the readmission join pipeline.
//!
//! Two families live here:
//!
//! - Fatal errors that stop a stage: [`InputError`], [`ConfigError`] and the
//!   top-level [`PipelineError`] that wraps them.
//! - Skip reasons that are never fatal: [`RowSkip`] for raw tabular rows seen by
//!   the classifier and [`LineSkip`] for intermediate lines seen by the reducer.
//!   Each skipped row or line carries exactly one reason so it can be counted
//!   and logged.
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::io;

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading the raw tabular input.
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to read from the source.
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),

    /// The CSV reader could not produce a record.
    #[error("Invalid tabular input: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in user-supplied options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Delimiters must be exactly one ASCII character.
    #[error("Invalid delimiter '{0}': expected a single ASCII character, '\\t' or 'tab'")]
    InvalidDelimiter(String),

    /// Encoding label not known to encoding_rs.
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// An environment variable held an unusable value.
    #[error("Invalid value for {var}: {message}")]
    Env { var: String, message: String },
}

// =============================================================================
// Row-level skips (classifier)
// =============================================================================

/// Why the classifier discarded a raw row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowSkip {
    /// Row with no non-blank cell.
    #[error("empty row")]
    Empty,

    /// Data row before any recognised header.
    #[error("no schema header seen yet")]
    NoSchema,

    /// Required column absent from the active header.
    #[error("column '{0}' missing from header")]
    MissingColumn(&'static str),

    /// Column is in the header but the row is too short to hold it.
    #[error("row has {len} cells, column '{column}' is at position {position}")]
    ShortRow {
        column: &'static str,
        position: usize,
        len: usize,
    },

    /// Join key cell is blank.
    #[error("empty join key '{0}'")]
    MissingKey(&'static str),

    /// Provider category other than short-term acute care.
    #[error("provider category '{0}' is not retained")]
    FilteredCategory(String),
}

// =============================================================================
// Line-level skips (reducer)
// =============================================================================

/// Why the reducer discarded an intermediate line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineSkip {
    /// Blank line.
    #[error("empty line")]
    Empty,

    /// No tab between key and payload.
    #[error("no tab separator between key and payload")]
    MissingTab,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors returned by the stage runners in [`crate::transform::pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input could not be read.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Options were invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Writing an output stream failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    /// The CSV writer failed.
    #[error("Failed to write CSV output: {0}")]
    CsvOutput(#[from] csv::Error),

    /// The run report could not be serialised.
    #[error("Failed to serialise report: {0}")]
    Report(#[from] serde_json::Error),
}

impl PipelineError {
    /// True when the downstream consumer closed the pipe (e.g. `| head`).
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            PipelineError::Output(e) => e.kind() == io::ErrorKind::BrokenPipe,
            PipelineError::CsvOutput(e) => match e.kind() {
                csv::ErrorKind::Io(io_err) => io_err.kind() == io::ErrorKind::BrokenPipe,
                _ => false,
            },
            _ => false,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
