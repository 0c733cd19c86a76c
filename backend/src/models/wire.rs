//! Intermediate line format between the classifier and the reducer.
//!
//! ```text
//! 010001<TAB>HRRP|READM-30-AMI-HRRP|0.9483|27
//! 010001<TAB>POS|01|067|420|420|312|Y|2
//! ```
//!
//! The key runs up to the first tab. The payload starts with its tag; field
//! order after the tag is fixed per tag.

use crate::error::LineSkip;

use super::{FacilityAttributes, MeasureFields, Tag};

/// Decoded payload of one intermediate line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Measure(MeasureFields),
    Characteristic(FacilityAttributes),
    /// Payload without a known `TAG|` prefix. It still has a key, so it still
    /// marks group boundaries.
    Unknown,
}

/// Split a line into its key and decoded payload.
///
/// A trailing `\n` or `\r\n` is ignored.
pub fn parse_line(line: &str) -> Result<(&str, Payload), LineSkip> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return Err(LineSkip::Empty);
    }

    let (key, payload) = line.split_once('\t').ok_or(LineSkip::MissingTab)?;
    Ok((key, parse_payload(payload)))
}

/// Decode a payload by its tag prefix.
pub fn parse_payload(payload: &str) -> Payload {
    let mut segments = payload.splitn(2, '|');
    let tag = segments.next().unwrap_or_default();
    let Some(rest) = segments.next() else {
        return Payload::Unknown;
    };

    match tag {
        Tag::MEASURE => {
            // Readmissions is the last segment and keeps any further pipes.
            let mut parts = rest.splitn(3, '|');
            Payload::Measure(MeasureFields {
                measure_name: parts.next().unwrap_or_default().to_string(),
                excess_ratio: parts.next().unwrap_or_default().to_string(),
                num_readmissions: parts.next().unwrap_or_default().to_string(),
            })
        }
        Tag::CHARACTERISTIC => Payload::Characteristic(FacilityAttributes::from_fields(rest.split('|'))),
        _ => Payload::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_line() {
        let (key, payload) = parse_line("A\tHRRP|m1|0.9|10\n").unwrap();
        assert_eq!(key, "A");
        assert_eq!(
            payload,
            Payload::Measure(MeasureFields {
                measure_name: "m1".into(),
                excess_ratio: "0.9".into(),
                num_readmissions: "10".into(),
            })
        );
    }

    #[test]
    fn test_measure_missing_trailing_fields() {
        let (_, payload) = parse_line("A\tHRRP|m1").unwrap();
        let Payload::Measure(fields) = payload else {
            panic!("expected measure payload");
        };
        assert_eq!(fields.measure_name, "m1");
        assert_eq!(fields.excess_ratio, "");
        assert_eq!(fields.num_readmissions, "");
    }

    #[test]
    fn test_measure_last_field_keeps_pipes() {
        let (_, payload) = parse_line("A\tHRRP|m1|0.9|10|extra").unwrap();
        let Payload::Measure(fields) = payload else {
            panic!("expected measure payload");
        };
        assert_eq!(fields.num_readmissions, "10|extra");
    }

    #[test]
    fn test_characteristic_line() {
        let (key, payload) = parse_line("B\tPOS|06|037||120|||Y\r\n").unwrap();
        assert_eq!(key, "B");
        let Payload::Characteristic(attrs) = payload else {
            panic!("expected characteristic payload");
        };
        assert_eq!(attrs.fips_state, "06");
        assert_eq!(attrs.fips_county, "037");
        assert_eq!(attrs.certified_beds, "");
        assert_eq!(attrs.bed_count, "120");
        assert_eq!(attrs.icu_service_code, "Y");
    }

    #[test]
    fn test_unknown_tags() {
        assert_eq!(parse_line("A\tXYZ|1|2").unwrap().1, Payload::Unknown);
        // Tag without its pipe is not a tag
        assert_eq!(parse_line("A\tHRRP").unwrap().1, Payload::Unknown);
        assert_eq!(parse_line("A\t").unwrap().1, Payload::Unknown);
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(parse_line("no tab here"), Err(LineSkip::MissingTab));
        assert_eq!(parse_line(""), Err(LineSkip::Empty));
        assert_eq!(parse_line("\n"), Err(LineSkip::Empty));
    }

    #[test]
    fn test_key_splits_on_first_tab_only() {
        let (key, payload) = parse_line("A\tHRRP|m\t1|0.9|10").unwrap();
        assert_eq!(key, "A");
        let Payload::Measure(fields) = payload else {
            panic!("expected measure payload");
        };
        assert_eq!(fields.measure_name, "m\t1");
    }
}
