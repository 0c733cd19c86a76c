//! Group key-ordered tagged lines and join each group.
//!
//! This module handles the reduce side: every run of consecutive lines with
//! the same key forms one [`Group`]. When the key changes (or the input ends)
//! the group is flushed: its POS rows are coalesced into one summary and
//! every HRRP row is written out with that summary attached.
//!
//! # Architecture
//!
//! ```text
//! sorted intermediate lines          groups                 output rows
//! ┌──────────────────────────┐      ┌──────────────────┐
//! │ A  HRRP|m1|0.9|10        │      │ A: 2 HRRP, 2 POS │  →  A,m1,...,06,037,06037,...
//! │ A  HRRP|m2|1.1|5         │  →   │                  │  →  A,m2,...,06,037,06037,...
//! │ A  POS|06||...           │      ├──────────────────┤
//! │ A  POS||037|...          │      │ B: 1 HRRP, 0 POS │  →  (dropped)
//! │ B  HRRP|m1|1.0|7         │      └──────────────────┘
//! └──────────────────────────┘
//! ```
//!
//! Only one group is held in memory at a time. Grouping relies on the input
//! being sorted by key; a key that reappears later simply starts another group.

use serde::Serialize;
use std::io::{BufRead, Write};

use crate::error::{InputError, PipelineError, PipelineResult};
use crate::models::{parse_line, EnrichedRow, FacilityAttributes, MeasureFields, Payload};

/// All rows seen for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    key: String,
    measures: Vec<MeasureFields>,
    characteristics: Vec<FacilityAttributes>,
}

/// Result of joining one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Rows written for the group.
    Joined(usize),
    Dropped(DropReason),
}

/// Why a flushed group produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No HRRP row for the key.
    NoMeasures,
    /// No retained POS row for the key.
    NoCharacteristics,
}

impl Group {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            measures: Vec::new(),
            characteristics: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn push(&mut self, payload: Payload) {
        match payload {
            Payload::Measure(fields) => self.measures.push(fields),
            Payload::Characteristic(attrs) => self.characteristics.push(attrs),
            Payload::Unknown => {}
        }
    }

    /// Inner-join the group, calling `emit` once per measure row.
    pub fn join<F>(self, mut emit: F) -> PipelineResult<JoinOutcome>
    where
        F: FnMut(EnrichedRow<'_>) -> PipelineResult<()>,
    {
        if self.measures.is_empty() {
            return Ok(JoinOutcome::Dropped(DropReason::NoMeasures));
        }
        if self.characteristics.is_empty() {
            return Ok(JoinOutcome::Dropped(DropReason::NoCharacteristics));
        }

        let summary = FacilityAttributes::coalesce(&self.characteristics);
        for measure in &self.measures {
            emit(EnrichedRow::new(&self.key, measure, &summary))?;
        }
        Ok(JoinOutcome::Joined(self.measures.len()))
    }
}

/// Counters for one reduce run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReduceStats {
    pub lines_read: u64,
    pub malformed_lines: u64,
    pub unknown_tags: u64,
    pub groups_joined: u64,
    pub groups_without_measures: u64,
    pub groups_without_characteristics: u64,
    pub rows_written: u64,
    pub out_of_order_keys: u64,
}

/// Streaming reducer writing joined rows as CSV.
///
/// The csv writer emits the header row with the first data row, so a run
/// that joins nothing writes nothing.
pub struct GroupReducer<W: Write> {
    writer: csv::Writer<W>,
    current: Option<Group>,
    stats: ReduceStats,
}

impl<W: Write> GroupReducer<W> {
    pub fn new(out: W, delimiter: u8) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        Self {
            writer,
            current: None,
            stats: ReduceStats::default(),
        }
    }

    pub fn stats(&self) -> &ReduceStats {
        &self.stats
    }

    /// Feed one intermediate line. Only write failures are errors.
    pub fn push_line(&mut self, line: &str) -> PipelineResult<()> {
        self.stats.lines_read += 1;

        let (key, payload) = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(skip) => {
                tracing::debug!(line = self.stats.lines_read, reason = %skip, "line skipped");
                self.stats.malformed_lines += 1;
                return Ok(());
            }
        };
        if payload == Payload::Unknown {
            self.stats.unknown_tags += 1;
        }

        match self.current.take() {
            Some(group) if group.key() == key => {
                self.current = Some(group);
            }
            Some(group) => {
                if key < group.key() {
                    self.stats.out_of_order_keys += 1;
                    tracing::debug!(previous = group.key(), key, "key out of order, input is not sorted");
                }
                self.flush(group)?;
                self.current = Some(Group::new(key));
            }
            None => self.current = Some(Group::new(key)),
        }

        if let Some(group) = self.current.as_mut() {
            group.push(payload);
        }
        Ok(())
    }

    /// Feed every line of a reader.
    pub fn push_reader<R: BufRead>(&mut self, mut input: R) -> PipelineResult<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = input
                .read_until(b'\n', &mut buf)
                .map_err(InputError::from)?;
            if read == 0 {
                return Ok(());
            }
            self.push_line(&String::from_utf8_lossy(&buf))?;
        }
    }

    /// Flush the last group and the writer, returning the stats and the sink.
    pub fn finish(mut self) -> PipelineResult<(ReduceStats, W)> {
        if let Some(group) = self.current.take() {
            self.flush(group)?;
        }
        if self.stats.out_of_order_keys > 0 {
            tracing::warn!(
                count = self.stats.out_of_order_keys,
                "input was not sorted by key; some keys were joined in several partial groups"
            );
        }

        self.writer.flush()?;
        let out = self
            .writer
            .into_inner()
            .map_err(|e| PipelineError::Output(e.into_error()))?;
        Ok((self.stats, out))
    }

    fn flush(&mut self, group: Group) -> PipelineResult<()> {
        let key = group.key().to_string();
        let writer = &mut self.writer;
        match group.join(|row| writer.serialize(row).map_err(PipelineError::from))? {
            JoinOutcome::Joined(rows) => {
                self.stats.groups_joined += 1;
                self.stats.rows_written += rows as u64;
            }
            JoinOutcome::Dropped(reason) => {
                tracing::debug!(key = %key, ?reason, "group dropped");
                match reason {
                    DropReason::NoMeasures => self.stats.groups_without_measures += 1,
                    DropReason::NoCharacteristics => self.stats.groups_without_characteristics += 1,
                }
            }
        }
        Ok(())
    }
}
