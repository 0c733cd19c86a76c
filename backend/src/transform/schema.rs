//! Header schemas of the two source datasets.
//!
//! A row is a header when its cells contain every required column of one
//! schema. Columns are then looked up by name through a [`ColumnIndex`] built
//! from that header, never by position, since column order differs between
//! yearly extracts.

use std::collections::{HashMap, HashSet};

use crate::error::RowSkip;
use crate::models::Tag;

/// Which dataset the current rows belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    /// HRRP: one row per facility per measure.
    Measure,
    /// POS: one or more rows per provider.
    Characteristic,
}

impl Schema {
    /// Columns whose presence identifies a header row.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Schema::Measure => &[
                columns::FACILITY_ID,
                columns::MEASURE_NAME,
                columns::EXCESS_RATIO,
                columns::NUM_READMISSIONS,
            ],
            Schema::Characteristic => &[
                columns::PROVIDER_NUMBER,
                columns::CATEGORY_CODE,
                columns::FIPS_STATE,
                columns::FIPS_COUNTY,
            ],
        }
    }

    /// Recognise a header row. HRRP wins if a row somehow matches both.
    pub fn detect<S: AsRef<str>>(row: &[S]) -> Option<Schema> {
        let names: HashSet<&str> = row.iter().map(|c| c.as_ref().trim()).collect();
        [Schema::Measure, Schema::Characteristic]
            .into_iter()
            .find(|schema| schema.required_columns().iter().all(|c| names.contains(c)))
    }

    pub fn tag(self) -> Tag {
        match self {
            Schema::Measure => Tag::Measure,
            Schema::Characteristic => Tag::Characteristic,
        }
    }
}

/// Source column names.
pub mod columns {
    pub const FACILITY_ID: &str = "Facility ID";
    pub const MEASURE_NAME: &str = "Measure Name";
    pub const EXCESS_RATIO: &str = "Excess Readmission Ratio";
    pub const NUM_READMISSIONS: &str = "Number of Readmissions";

    pub const PROVIDER_NUMBER: &str = "PRVDR_NUM";
    pub const CATEGORY_CODE: &str = "PRVDR_CTGRY_CD";
    pub const FIPS_STATE: &str = "FIPS_STATE_CD";
    pub const FIPS_COUNTY: &str = "FIPS_CNTY_CD";
    pub const CERTIFIED_BEDS: &str = "CRTFD_BED_CNT";
    pub const BED_COUNT: &str = "BED_CNT";
    pub const BEDS_COUNT: &str = "BEDS_CNT";
    pub const RN_COUNT: &str = "RN_CNT";
    pub const ICU: &str = "ICU";
    pub const ICU_SERVICE_CODE: &str = "ICU_SRVC_CD";
    pub const ICU_SERVICE_IND: &str = "ICU_SRVC_IND";
}

/// A logical field and the column names that may hold it, in preference order.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub candidates: &'static [&'static str],
}

/// Optional POS attributes and their fallback chains.
pub mod fields {
    use super::columns::*;
    use super::Field;

    pub const FIPS_STATE_CD: Field = Field { candidates: &[FIPS_STATE] };
    pub const FIPS_CNTY_CD: Field = Field { candidates: &[FIPS_COUNTY] };
    pub const CRTFD_BED_CNT: Field = Field { candidates: &[CERTIFIED_BEDS] };
    pub const BED_CNT: Field = Field { candidates: &[BED_COUNT, BEDS_COUNT] };
    pub const RN_CNT: Field = Field { candidates: &[RN_COUNT] };
    pub const ICU_FLAG: Field = Field { candidates: &[ICU] };
    pub const ICU_SRVC_CD: Field = Field { candidates: &[ICU_SERVICE_CODE, ICU_SERVICE_IND] };
}

/// Column name to position, built from one header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Index a header row. A repeated name resolves to its last position.
    pub fn from_header<S: AsRef<str>>(header: &[S]) -> Self {
        let positions = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().trim().to_string(), i))
            .collect();
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Cell of a column the header is known to contain.
    pub fn require<'r>(&self, row: &'r [String], column: &'static str) -> Result<&'r str, RowSkip> {
        match self.position(column) {
            Some(position) => cell(row, column, position),
            None => Err(RowSkip::MissingColumn(column)),
        }
    }

    /// Cell of the first candidate column the header contains, or `""` when
    /// it contains none.
    pub fn resolve<'r>(&self, row: &'r [String], field: Field) -> Result<&'r str, RowSkip> {
        for &column in field.candidates {
            if let Some(position) = self.position(column) {
                return cell(row, column, position);
            }
        }
        Ok("")
    }
}

fn cell<'r>(row: &'r [String], column: &'static str, position: usize) -> Result<&'r str, RowSkip> {
    row.get(position)
        .map(String::as_str)
        .ok_or(RowSkip::ShortRow {
            column,
            position,
            len: row.len(),
        })
}

/// Left-pad a numeric code with zeros, keeping a leading sign in front.
/// Blank input stays blank.
pub fn zero_pad(code: &str, width: usize) -> String {
    let code = code.trim();
    if code.is_empty() {
        return String::new();
    }

    let (sign, digits) = match code.strip_prefix(['+', '-']) {
        Some(rest) => (&code[..1], rest),
        None => ("", code),
    };
    let fill = width.saturating_sub(code.chars().count());
    format!("{}{}{}", sign, "0".repeat(fill), digits)
}
