//! Run options.
//!
//! Values resolve in priority order:
//! 1. Command-line flag
//! 2. Environment variable (a `.env` file is loaded first when present)
//! 3. Default

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{ConfigError, ConfigResult};
use crate::parser::encoding_for_label;

/// Input delimiter; auto-detected when unset.
pub const ENV_DELIMITER: &str = "READMIT_JOIN_DELIMITER";
/// Input encoding label; auto-detected when unset.
pub const ENV_ENCODING: &str = "READMIT_JOIN_ENCODING";
/// Delimiter of the joined output.
pub const ENV_OUTPUT_DELIMITER: &str = "READMIT_JOIN_OUTPUT_DELIMITER";

/// Options shared by the pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    /// Delimiter of the raw tabular input (auto-detect if not set)
    pub delimiter: Option<char>,

    /// Encoding label of the raw tabular input (auto-detect if not set)
    pub encoding: Option<String>,

    /// Delimiter of the joined output
    pub output_delimiter: char,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: None,
            output_delimiter: ',',
        }
    }
}

impl JoinOptions {
    /// Options from the process environment, after loading `.env` if present.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Options from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(raw) = lookup(ENV_DELIMITER) {
            options.delimiter = Some(parse_env_delimiter(ENV_DELIMITER, &raw)?);
        }
        if let Some(raw) = lookup(ENV_ENCODING) {
            if encoding_for_label(raw.trim()).is_none() {
                return Err(ConfigError::Env {
                    var: ENV_ENCODING.to_string(),
                    message: format!("unknown encoding '{}'", raw),
                });
            }
            options.encoding = Some(raw.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_OUTPUT_DELIMITER) {
            options.output_delimiter = parse_env_delimiter(ENV_OUTPUT_DELIMITER, &raw)?;
        }

        Ok(options)
    }

    /// Override the input delimiter when given
    pub fn with_delimiter(mut self, delimiter: Option<char>) -> Self {
        if delimiter.is_some() {
            self.delimiter = delimiter;
        }
        self
    }

    /// Override the input encoding when given
    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        if encoding.is_some() {
            self.encoding = encoding;
        }
        self
    }

    /// Override the output delimiter when given
    pub fn with_output_delimiter(mut self, delimiter: Option<char>) -> Self {
        if let Some(d) = delimiter {
            self.output_delimiter = d;
        }
        self
    }

    pub fn input_delimiter(&self) -> ConfigResult<Option<u8>> {
        self.delimiter.map(delimiter_byte).transpose()
    }

    pub fn output_delimiter_byte(&self) -> ConfigResult<u8> {
        delimiter_byte(self.output_delimiter)
    }

    pub fn input_encoding(&self) -> ConfigResult<Option<&'static Encoding>> {
        match &self.encoding {
            None => Ok(None),
            Some(label) => encoding_for_label(label)
                .map(Some)
                .ok_or_else(|| ConfigError::UnknownEncoding(label.clone())),
        }
    }
}

/// Parse a delimiter argument: one character, or `\t` / `tab`.
pub fn parse_delimiter(raw: &str) -> ConfigResult<char> {
    match raw {
        "\\t" | "tab" | "TAB" => return Ok('\t'),
        _ => {}
    }

    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(ConfigError::InvalidDelimiter(raw.to_string())),
    }
}

fn parse_env_delimiter(var: &str, raw: &str) -> ConfigResult<char> {
    parse_delimiter(raw).map_err(|e| ConfigError::Env {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn delimiter_byte(c: char) -> ConfigResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ConfigError::InvalidDelimiter(c.to_string()))
}
