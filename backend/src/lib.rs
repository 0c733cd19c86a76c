//! # readmit-join - HRRP readmission measures joined with POS facility data
//!
//! Joins the CMS Hospital Readmissions Reduction Program table (one row per
//! facility and measure) with the Provider of Services file (one or more
//! sparse rows per provider) on the provider number, as a two-stage
//! map / sort / reduce stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ HRRP + POS  │────▶│ Classifier  │────▶│  Sort by    │────▶│   Grouper   │────▶ joined CSV
//! │  (mixed)    │     │ (tag rows)  │     │    key      │     │ (coalesce)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use readmit_join::{map_stream, reduce_to_writer, JoinOptions};
//!
//! let options = JoinOptions::default();
//! let mut tagged = Vec::new();
//! map_stream(std::fs::File::open("hrrp.csv")?, &options, &mut tagged)?;
//! // ... sort `tagged` by key ...
//! reduce_to_writer(&tagged[..], &options, std::io::stdout())?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Fatal errors and per-row skip reasons
//! - [`config`] - Run options (flags, environment, defaults)
//! - [`models`] - Records, tags and the intermediate line format
//! - [`parser`] - Tabular input with encoding/delimiter detection
//! - [`transform`] - Classifier, grouper and stage runners

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, InputError, LineSkip, PipelineError, PipelineResult, RowSkip};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{parse_delimiter, JoinOptions};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CharacteristicRecord,
    EnrichedRow,
    FacilityAttributes,
    MeasureFields,
    MeasureRecord,
    Payload,
    Tag,
    TaggedRecord,
    OUTPUT_HEADER,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{detect_delimiter, detect_encoding, RowReader};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    Classifier,
    GroupReducer,
    MapStats,
    ReduceStats,
    Schema,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    inspect,
    map_files,
    map_stream,
    reduce_to_writer,
    run_files,
    InputInfo,
    RunReport,
};
