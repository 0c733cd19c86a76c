//! Stage runners for the readmission join.
//!
//! The two core stages stream from a reader to a writer:
//!
//! - [`map_stream`] / [`map_files`]: raw HRRP/POS tables → tagged intermediate lines
//! - [`reduce_to_writer`]: key-sorted intermediate lines → joined CSV
//!
//! Between them a sort by key is expected (`sort -t$'\t' -k1,1 -s` or the
//! shuffle of a streaming map/reduce job). [`run_files`] chains both stages
//! locally with an in-memory stable sort.
//!
//! # Example
//!
//! ```rust,ignore
//! use readmit_join::{run_files, JoinOptions};
//! use std::path::PathBuf;
//!
//! let inputs = vec![PathBuf::from("hrrp.csv"), PathBuf::from("pos.csv")];
//! let report = run_files(&inputs, &JoinOptions::default(), std::io::stdout())?;
//! eprintln!("{} rows written", report.reduce.rows_written);
//! ```

use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::JoinOptions;
use crate::error::{InputError, PipelineResult};
use crate::models::TaggedRecord;
use crate::parser::{format_delimiter, RowReader};

use super::classifier::{Classifier, MapStats};
use super::grouper::{GroupReducer, ReduceStats};
use super::schema::Schema;

/// Summary of a local `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Options used for the run
    pub options: JoinOptions,

    /// Input files, in the order they were classified
    pub inputs: Vec<String>,

    /// Classification counters over all inputs
    pub map: MapStats,

    /// Grouping and join counters
    pub reduce: ReduceStats,
}

impl RunReport {
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A header row found by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    pub line: u64,
    pub schema: String,
    pub columns: usize,
}

/// What the reader detects about one input file.
#[derive(Debug, Clone, Serialize)]
pub struct InputInfo {
    pub encoding: String,
    pub delimiter: String,
    pub rows: u64,
    pub headers: Vec<HeaderInfo>,
}

/// Classify one tabular stream, writing intermediate lines to `out`.
pub fn map_stream<R: Read, W: Write>(input: R, options: &JoinOptions, mut out: W) -> PipelineResult<MapStats> {
    let rows = RowReader::open(input, options)?;
    let mut classifier = Classifier::new();
    classifier.run(rows, |record| {
        writeln!(out, "{}", record)?;
        Ok(())
    })?;
    out.flush()?;

    let stats = classifier.into_stats();
    log_map_stats(&stats);
    Ok(stats)
}

/// Classify several files in order. Each file starts with no schema, so
/// every file needs its own header rows.
pub fn map_files<W: Write>(paths: &[PathBuf], options: &JoinOptions, mut out: W) -> PipelineResult<MapStats> {
    let mut total = MapStats::default();
    for path in paths {
        tracing::info!(input = %path.display(), "classifying");
        let stats = map_stream(open(path)?, options, &mut out)?;
        total.merge(&stats);
    }
    Ok(total)
}

/// Reduce a key-sorted intermediate stream into joined CSV.
pub fn reduce_to_writer<R: Read, W: Write>(input: R, options: &JoinOptions, out: W) -> PipelineResult<ReduceStats> {
    let mut reducer = GroupReducer::new(out, options.output_delimiter_byte()?);
    reducer.push_reader(BufReader::new(input))?;
    let (stats, _) = reducer.finish()?;
    log_reduce_stats(&stats);
    Ok(stats)
}

/// Classify every input, sort the tagged records by key and reduce them.
pub fn run_files<W: Write>(paths: &[PathBuf], options: &JoinOptions, out: W) -> PipelineResult<RunReport> {
    let output_delimiter = options.output_delimiter_byte()?;

    let mut records = Vec::new();
    let mut map = MapStats::default();
    for path in paths {
        tracing::info!(input = %path.display(), "classifying");
        let rows = RowReader::open(open(path)?, options)?;
        let mut classifier = Classifier::new();
        classifier.run(rows, |record| {
            records.push(record);
            Ok(())
        })?;
        let stats = classifier.into_stats();
        log_map_stats(&stats);
        map.merge(&stats);
    }

    sort_by_key(&mut records);
    tracing::debug!(records = records.len(), "sorted intermediate records");

    let mut reducer = GroupReducer::new(out, output_delimiter);
    for record in &records {
        reducer.push_line(&record.to_string())?;
    }
    let (reduce, _) = reducer.finish()?;
    log_reduce_stats(&reduce);

    Ok(RunReport {
        options: options.clone(),
        inputs: paths.iter().map(|p| p.display().to_string()).collect(),
        map,
        reduce,
    })
}

/// Stable sort by join key, so arrival order survives within a key.
pub fn sort_by_key(records: &mut [TaggedRecord]) {
    records.sort_by(|a, b| a.key().cmp(b.key()));
}

/// Detect encoding, delimiter and schema headers of a tabular file.
pub fn inspect(path: &Path, options: &JoinOptions) -> PipelineResult<InputInfo> {
    let mut rows = RowReader::open(open(path)?, options)?;
    let mut info = InputInfo {
        encoding: rows.encoding().name().to_string(),
        delimiter: format_delimiter(rows.delimiter()),
        rows: 0,
        headers: Vec::new(),
    };

    while let Some(row) = rows.next_row()? {
        info.rows += 1;
        if let Some(schema) = Schema::detect(&row) {
            info.headers.push(HeaderInfo {
                line: rows.line(),
                schema: schema.tag().to_string(),
                columns: row.len(),
            });
        }
    }
    Ok(info)
}

fn open(path: &Path) -> PipelineResult<File> {
    Ok(File::open(path).map_err(InputError::from)?)
}

fn log_map_stats(stats: &MapStats) {
    tracing::info!(
        rows = stats.rows_read,
        hrrp = stats.measure_records,
        pos = stats.characteristic_records,
        skipped = stats.rows_skipped(),
        filtered_category = stats.filtered_category,
        "classification finished"
    );
    if stats.measure_headers + stats.characteristic_headers == 0 && stats.rows_read > 0 {
        tracing::warn!("no HRRP or POS header found in input");
    }
}

fn log_reduce_stats(stats: &ReduceStats) {
    tracing::info!(
        lines = stats.lines_read,
        joined = stats.groups_joined,
        without_pos = stats.groups_without_characteristics,
        without_hrrp = stats.groups_without_measures,
        rows = stats.rows_written,
        "join finished"
    );
}
