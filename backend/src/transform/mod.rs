//! Transformation module.
//!
//! This module handles the two pipeline stages:
//! - Schema: header detection and column lookup
//! - Classifier: raw rows to tagged intermediate records
//! - Grouper: key-ordered records to joined rows
//! - Pipeline: stage runners over readers, writers and files

pub mod classifier;
pub mod grouper;
pub mod pipeline;
pub mod schema;

pub use classifier::{Classifier, MapStats, RowOutcome, ACUTE_CARE_CATEGORY};
pub use grouper::{DropReason, Group, GroupReducer, JoinOutcome, ReduceStats};
pub use pipeline::*;
pub use schema::{zero_pad, ColumnIndex, Schema};
