//! Raw tabular input with encoding and delimiter auto-detection.
//!
//! Yields each row as trimmed cells. Splitting is done by the `csv` crate.
//! Delimiter sniffing looks for a recognised header line, since extracts may
//! open with free-text preamble lines.

use encoding_rs::Encoding;
use std::io::{BufRead, BufReader, Read};

use crate::config::JoinOptions;
use crate::error::{InputError, InputResult, PipelineResult};
use crate::transform::Schema;

/// Bytes inspected for encoding and delimiter detection.
const SNIFF_LEN: usize = 64 * 1024;

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 is taken as is; a sample cut inside a multibyte sequence still
/// counts as valid. Anything else is left to chardet.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    match std::str::from_utf8(bytes) {
        Ok(_) => return encoding_rs::UTF_8,
        Err(e) if e.error_len().is_none() => return encoding_rs::UTF_8,
        Err(_) => {}
    }
    let result = chardet::detect(bytes);
    encoding_for_label(&result.0).unwrap_or(encoding_rs::UTF_8)
}

/// Look up an encoding by label, folding the names chardet reports.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    match label.to_lowercase().as_str() {
        // encoding_rs maps "ascii" to windows-1252; ASCII input is valid UTF-8
        "ascii" | "utf-8" | "utf8" | "" => Some(encoding_rs::UTF_8),
        "iso-8859-1" | "latin-1" | "latin1" => Some(encoding_rs::WINDOWS_1252),
        other => Encoding::for_label(other.as_bytes()),
    }
}

/// Decode one cell, replacing malformed sequences.
pub fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

/// Candidate input delimiters, in order of preference.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Detect the delimiter from the first line that splits into a recognised
/// HRRP or POS header. Lines before it are ignored; `,` if none is found.
pub fn detect_delimiter(content: &str) -> u8 {
    content
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}'))
        .find_map(header_delimiter)
        .unwrap_or(b',')
}

fn header_delimiter(line: &str) -> Option<u8> {
    DELIMITERS.into_iter().find(|&sep| {
        let cells: Vec<&str> = line
            .split(sep as char)
            .map(|cell| cell.trim().trim_matches('"'))
            .collect();
        Schema::detect(&cells).is_some()
    })
}

/// Printable form of a delimiter byte.
pub fn format_delimiter(d: u8) -> String {
    match d {
        b'\t' => "\\t".to_string(),
        c => (c as char).to_string(),
    }
}

/// Streaming reader over raw rows.
pub struct RowReader<R: Read> {
    records: csv::Reader<R>,
    record: csv::ByteRecord,
    encoding: &'static Encoding,
    delimiter: u8,
    at_start: bool,
}

impl<R: Read> RowReader<BufReader<R>> {
    /// Open a reader, detecting whatever `options` leaves unset from the
    /// leading bytes of the input.
    pub fn open(reader: R, options: &JoinOptions) -> PipelineResult<Self> {
        let mut buffered = BufReader::with_capacity(SNIFF_LEN, reader);
        let sample = buffered.fill_buf().map_err(InputError::from)?;

        let encoding = match options.input_encoding()? {
            Some(enc) => enc,
            None => detect_encoding(sample),
        };
        let delimiter = match options.input_delimiter()? {
            Some(d) => d,
            None => detect_delimiter(&decode_field(sample, encoding)),
        };

        tracing::debug!(
            encoding = encoding.name(),
            delimiter = %format_delimiter(delimiter),
            "opened tabular input"
        );
        Ok(Self::with_settings(buffered, encoding, delimiter))
    }
}

impl<R: Read> RowReader<R> {
    /// Reader with fixed settings, no detection.
    pub fn with_settings(reader: R, encoding: &'static Encoding, delimiter: u8) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);
        Self {
            records,
            record: csv::ByteRecord::new(),
            encoding,
            delimiter,
            at_start: true,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// 1-based line of the most recently read row.
    pub fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }

    /// Read the next row as trimmed cells; `None` at end of input.
    pub fn next_row(&mut self) -> InputResult<Option<Vec<String>>> {
        if !self.records.read_byte_record(&mut self.record)? {
            return Ok(None);
        }

        let mut cells: Vec<String> = self
            .record
            .iter()
            .map(|bytes| decode_field(bytes, self.encoding).trim().to_string())
            .collect();

        if self.at_start {
            self.at_start = false;
            if let Some(first) = cells.first_mut() {
                if let Some(stripped) = first.strip_prefix('\u{feff}') {
                    *first = stripped.trim_start().to_string();
                }
            }
        }

        Ok(Some(cells))
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = InputResult<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
