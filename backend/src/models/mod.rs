//! Domain models for the readmission join.
//!
//! - [`MeasureRecord`] - one HRRP row: a facility's result for one measure
//! - [`CharacteristicRecord`] - one POS row for a short-term acute care provider
//! - [`FacilityAttributes`] - the seven sparse POS attributes carried through the join
//! - [`TaggedRecord`] - either record kind, as written to the intermediate stream
//! - [`EnrichedRow`] - one output row of the join
//!
//! The intermediate line format lives in [`wire`].

pub mod wire;

use serde::Serialize;
use std::fmt;

pub use wire::{parse_line, Payload};

// =============================================================================
// Tags
// =============================================================================

/// Discriminator written as the first payload segment of an intermediate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tag {
    /// Hospital Readmissions Reduction Program measure row.
    Measure,
    /// Provider of Services characteristics row.
    Characteristic,
}

impl Tag {
    pub const MEASURE: &'static str = "HRRP";
    pub const CHARACTERISTIC: &'static str = "POS";

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Measure => Self::MEASURE,
            Tag::Characteristic => Self::CHARACTERISTIC,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Measure side
// =============================================================================

/// Measure values carried through the join untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasureFields {
    pub measure_name: String,
    pub excess_ratio: String,
    pub num_readmissions: String,
}

/// One HRRP row, keyed by facility id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRecord {
    pub facility_id: String,
    pub fields: MeasureFields,
}

// =============================================================================
// Characteristic side
// =============================================================================

/// The sparse POS attributes, in wire order.
///
/// FIPS codes are already zero-padded when they reach this struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilityAttributes {
    pub fips_state: String,
    pub fips_county: String,
    pub certified_beds: String,
    pub bed_count: String,
    pub rn_count: String,
    pub icu: String,
    pub icu_service_code: String,
}

/// Number of POS attributes on the wire.
pub const ATTRIBUTE_COUNT: usize = 7;

impl FacilityAttributes {
    /// Attributes in wire order.
    pub fn fields(&self) -> [&str; ATTRIBUTE_COUNT] {
        [
            &self.fips_state,
            &self.fips_county,
            &self.certified_beds,
            &self.bed_count,
            &self.rn_count,
            &self.icu,
            &self.icu_service_code,
        ]
    }

    fn fields_mut(&mut self) -> [&mut String; ATTRIBUTE_COUNT] {
        [
            &mut self.fips_state,
            &mut self.fips_county,
            &mut self.certified_beds,
            &mut self.bed_count,
            &mut self.rn_count,
            &mut self.icu,
            &mut self.icu_service_code,
        ]
    }

    /// Build from wire-ordered values; missing trailing values are empty, extras ignored.
    pub fn from_fields<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut attrs = Self::default();
        for (slot, value) in attrs.fields_mut().into_iter().zip(values) {
            *slot = value.to_string();
        }
        attrs
    }

    /// Resolve one summary from several rows of the same provider.
    ///
    /// Each attribute independently takes the first non-empty value in
    /// iteration order, so two attributes may come from different rows.
    pub fn coalesce<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a FacilityAttributes>,
    {
        let mut best = Self::default();
        for row in rows {
            for (slot, value) in best.fields_mut().into_iter().zip(row.fields()) {
                if slot.is_empty() && !value.is_empty() {
                    *slot = value.to_string();
                }
            }
        }
        best
    }

    /// Five-digit county FIPS: state code followed by county code.
    pub fn fips(&self) -> String {
        format!("{}{}", self.fips_state, self.fips_county)
    }
}

/// One POS row, keyed by provider number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicRecord {
    pub provider_number: String,
    pub attributes: FacilityAttributes,
}

// =============================================================================
// Tagged record
// =============================================================================

/// A classified row ready for the intermediate stream.
///
/// `Display` renders the wire line `key<TAB>TAG|field|field|...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedRecord {
    Measure(MeasureRecord),
    Characteristic(CharacteristicRecord),
}

impl TaggedRecord {
    /// Join key.
    pub fn key(&self) -> &str {
        match self {
            TaggedRecord::Measure(m) => &m.facility_id,
            TaggedRecord::Characteristic(c) => &c.provider_number,
        }
    }

    pub fn tag(&self) -> Tag {
        match self {
            TaggedRecord::Measure(_) => Tag::Measure,
            TaggedRecord::Characteristic(_) => Tag::Characteristic,
        }
    }

    /// Payload segment of the wire line (everything after the tab).
    pub fn payload(&self) -> String {
        match self {
            TaggedRecord::Measure(m) => format!(
                "{}|{}|{}|{}",
                Tag::MEASURE,
                m.fields.measure_name,
                m.fields.excess_ratio,
                m.fields.num_readmissions
            ),
            TaggedRecord::Characteristic(c) => {
                let mut payload = String::from(Tag::CHARACTERISTIC);
                for value in c.attributes.fields() {
                    payload.push('|');
                    payload.push_str(value);
                }
                payload
            }
        }
    }
}

impl fmt::Display for TaggedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key(), self.payload())
    }
}

// =============================================================================
// Output row
// =============================================================================

/// Column names of the joined output, in order.
pub const OUTPUT_HEADER: [&str; 12] = [
    "Facility ID",
    "Measure Name",
    "Excess Readmission Ratio",
    "Number of Readmissions",
    "FIPS_STATE_CD",
    "FIPS_CNTY_CD",
    "FIPS",
    "CRTFD_BED_CNT",
    "BED_CNT",
    "RN_CNT",
    "ICU",
    "ICU_SRVC_CD",
];

/// One joined row. Serialised by the csv writer, which derives the header
/// from the renamed fields (see [`OUTPUT_HEADER`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRow<'a> {
    #[serde(rename = "Facility ID")]
    pub facility_id: &'a str,
    #[serde(rename = "Measure Name")]
    pub measure_name: &'a str,
    #[serde(rename = "Excess Readmission Ratio")]
    pub excess_ratio: &'a str,
    #[serde(rename = "Number of Readmissions")]
    pub num_readmissions: &'a str,
    #[serde(rename = "FIPS_STATE_CD")]
    pub fips_state: &'a str,
    #[serde(rename = "FIPS_CNTY_CD")]
    pub fips_county: &'a str,
    #[serde(rename = "FIPS")]
    pub fips: String,
    #[serde(rename = "CRTFD_BED_CNT")]
    pub certified_beds: &'a str,
    #[serde(rename = "BED_CNT")]
    pub bed_count: &'a str,
    #[serde(rename = "RN_CNT")]
    pub rn_count: &'a str,
    #[serde(rename = "ICU")]
    pub icu: &'a str,
    #[serde(rename = "ICU_SRVC_CD")]
    pub icu_service_code: &'a str,
}

impl<'a> EnrichedRow<'a> {
    pub fn new(key: &'a str, measure: &'a MeasureFields, summary: &'a FacilityAttributes) -> Self {
        Self {
            facility_id: key,
            measure_name: &measure.measure_name,
            excess_ratio: &measure.excess_ratio,
            num_readmissions: &measure.num_readmissions,
            fips_state: &summary.fips_state,
            fips_county: &summary.fips_county,
            fips: summary.fips(),
            certified_beds: &summary.certified_beds,
            bed_count: &summary.bed_count,
            rn_count: &summary.rn_count,
            icu: &summary.icu,
            icu_service_code: &summary.icu_service_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(values: [&str; 7]) -> FacilityAttributes {
        FacilityAttributes::from_fields(values)
    }

    #[test]
    fn test_coalesce_takes_first_non_empty_per_field() {
        let rows = vec![
            attrs(["", "037", "", "120", "", "", ""]),
            attrs(["06", "999", "100", "", "45", "", ""]),
            attrs(["07", "", "", "", "", "Y", "2"]),
        ];

        let best = FacilityAttributes::coalesce(&rows);

        assert_eq!(best.fips_state, "06");
        assert_eq!(best.fips_county, "037");
        assert_eq!(best.certified_beds, "100");
        assert_eq!(best.bed_count, "120");
        assert_eq!(best.rn_count, "45");
        assert_eq!(best.icu, "Y");
        assert_eq!(best.icu_service_code, "2");
        assert_eq!(best.fips(), "06037");
    }

    #[test]
    fn test_coalesce_all_empty_stays_empty() {
        let rows = vec![FacilityAttributes::default(), FacilityAttributes::default()];
        let best = FacilityAttributes::coalesce(&rows);

        assert_eq!(best, FacilityAttributes::default());
        assert_eq!(best.fips(), "");
    }

    #[test]
    fn test_from_fields_short_and_long() {
        let short = FacilityAttributes::from_fields(["06", "037"]);
        assert_eq!(short.fips_state, "06");
        assert_eq!(short.icu_service_code, "");

        let long = FacilityAttributes::from_fields(["1", "2", "3", "4", "5", "6", "7", "8"]);
        assert_eq!(long.icu_service_code, "7");
    }

    #[test]
    fn test_tagged_record_display() {
        let measure = TaggedRecord::Measure(MeasureRecord {
            facility_id: "010001".into(),
            fields: MeasureFields {
                measure_name: "READM-30-AMI-HRRP".into(),
                excess_ratio: "0.9483".into(),
                num_readmissions: "".into(),
            },
        });
        assert_eq!(measure.to_string(), "010001\tHRRP|READM-30-AMI-HRRP|0.9483|");
        assert_eq!(measure.tag(), Tag::Measure);

        let pos = TaggedRecord::Characteristic(CharacteristicRecord {
            provider_number: "010001".into(),
            attributes: attrs(["01", "067", "420", "", "", "", "Y"]),
        });
        assert_eq!(pos.to_string(), "010001\tPOS|01|067|420||||Y");
        assert_eq!(pos.key(), "010001");
    }

    #[test]
    fn test_enriched_row_derives_fips() {
        let measure = MeasureFields {
            measure_name: "m1".into(),
            excess_ratio: "0.9".into(),
            num_readmissions: "10".into(),
        };
        let summary = attrs(["06", "037", "", "", "", "", ""]);
        let row = EnrichedRow::new("A", &measure, &summary);

        assert_eq!(row.fips, "06037");
        assert_eq!(row.facility_id, "A");
        assert_eq!(row.measure_name, "m1");
    }
}
