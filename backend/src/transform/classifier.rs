//! Classify a mixed HRRP/POS row stream into tagged records.
//!
//! # Architecture
//!
//! ```text
//! raw rows                              state          emitted
//! ┌──────────────────────────────────┐
//! │ Facility ID,Measure Name,...     │  → Measure      (header, consumed)
//! │ 010001,READM-30-AMI-HRRP,0.94,27 │                 010001 HRRP|READM-30-AMI-HRRP|0.94|27
//! │ PRVDR_NUM,PRVDR_CTGRY_CD,...     │  → Characteristic
//! │ 010001,01,1,67,...               │                 010001 POS|01|067|...
//! │ 010002,05,1,67,...               │                 (category filtered)
//! └──────────────────────────────────┘
//! ```
//!
//! Header rows may reappear anywhere; each one switches the schema and
//! rebuilds the column index. Rows that cannot be classified are skipped
//! with a [`RowSkip`] reason and never stop the stream.

use serde::Serialize;

use crate::error::{InputError, PipelineError, PipelineResult, RowSkip};
use crate::models::{CharacteristicRecord, FacilityAttributes, MeasureFields, MeasureRecord, TaggedRecord};

use super::schema::{columns, fields, zero_pad, ColumnIndex, Schema};

/// Provider category for short-term acute care hospitals.
pub const ACUTE_CARE_CATEGORY: &str = "01";

/// Outcome of one accepted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// A header switched the active schema.
    Header(Schema),
    /// A data row was classified.
    Record(TaggedRecord),
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    NoSchema,
    Active { schema: Schema, columns: ColumnIndex },
}

/// Counters for one classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MapStats {
    pub rows_read: u64,
    pub measure_headers: u64,
    pub characteristic_headers: u64,
    pub measure_records: u64,
    pub characteristic_records: u64,
    pub empty_rows: u64,
    pub rows_before_header: u64,
    pub short_rows: u64,
    pub missing_keys: u64,
    pub filtered_category: u64,
}

impl MapStats {
    pub fn records_emitted(&self) -> u64 {
        self.measure_records + self.characteristic_records
    }

    pub fn rows_skipped(&self) -> u64 {
        self.empty_rows + self.rows_before_header + self.short_rows + self.missing_keys + self.filtered_category
    }

    fn record_outcome(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Header(Schema::Measure) => self.measure_headers += 1,
            RowOutcome::Header(Schema::Characteristic) => self.characteristic_headers += 1,
            RowOutcome::Record(TaggedRecord::Measure(_)) => self.measure_records += 1,
            RowOutcome::Record(TaggedRecord::Characteristic(_)) => self.characteristic_records += 1,
        }
    }

    fn record_skip(&mut self, skip: &RowSkip) {
        match skip {
            RowSkip::Empty => self.empty_rows += 1,
            RowSkip::NoSchema => self.rows_before_header += 1,
            RowSkip::MissingColumn(_) | RowSkip::ShortRow { .. } => self.short_rows += 1,
            RowSkip::MissingKey(_) => self.missing_keys += 1,
            RowSkip::FilteredCategory(_) => self.filtered_category += 1,
        }
    }

    /// Add another run's counters.
    pub fn merge(&mut self, other: &MapStats) {
        self.rows_read += other.rows_read;
        self.measure_headers += other.measure_headers;
        self.characteristic_headers += other.characteristic_headers;
        self.measure_records += other.measure_records;
        self.characteristic_records += other.characteristic_records;
        self.empty_rows += other.empty_rows;
        self.rows_before_header += other.rows_before_header;
        self.short_rows += other.short_rows;
        self.missing_keys += other.missing_keys;
        self.filtered_category += other.filtered_category;
    }
}

/// Stateful row classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    state: State,
    stats: MapStats,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the most recent header, if any.
    pub fn schema(&self) -> Option<Schema> {
        match &self.state {
            State::NoSchema => None,
            State::Active { schema, .. } => Some(*schema),
        }
    }

    pub fn stats(&self) -> &MapStats {
        &self.stats
    }

    pub fn into_stats(self) -> MapStats {
        self.stats
    }

    /// Classify one row, updating schema state on headers.
    pub fn classify<S: AsRef<str>>(&mut self, row: &[S]) -> Result<RowOutcome, RowSkip> {
        if row.iter().all(|c| c.as_ref().trim().is_empty()) {
            return Err(RowSkip::Empty);
        }

        if let Some(schema) = Schema::detect(row) {
            self.state = State::Active {
                schema,
                columns: ColumnIndex::from_header(row),
            };
            return Ok(RowOutcome::Header(schema));
        }

        let State::Active { schema, columns: index } = &self.state else {
            return Err(RowSkip::NoSchema);
        };

        let cells: Vec<String> = row.iter().map(|c| c.as_ref().trim().to_string()).collect();
        let record = match schema {
            Schema::Measure => measure_record(index, &cells)?,
            Schema::Characteristic => characteristic_record(index, &cells)?,
        };
        Ok(RowOutcome::Record(record))
    }

    /// Classify every row from `rows`, handing accepted records to `sink`.
    ///
    /// Row-level problems are counted and skipped; only input errors and
    /// errors returned by `sink` stop the run.
    pub fn run<I, F>(&mut self, rows: I, mut sink: F) -> PipelineResult<()>
    where
        I: IntoIterator<Item = Result<Vec<String>, InputError>>,
        F: FnMut(TaggedRecord) -> PipelineResult<()>,
    {
        for row in rows {
            let row = row.map_err(PipelineError::from)?;
            self.stats.rows_read += 1;
            let row_number = self.stats.rows_read;

            match self.classify(row.as_slice()) {
                Ok(outcome) => {
                    self.stats.record_outcome(&outcome);
                    match outcome {
                        RowOutcome::Header(schema) => {
                            tracing::debug!(row = row_number, ?schema, columns = row.len(), "schema header");
                        }
                        RowOutcome::Record(record) => sink(record)?,
                    }
                }
                Err(skip) => {
                    if skip == RowSkip::NoSchema && self.stats.rows_before_header == 0 {
                        tracing::warn!(row = row_number, "data rows before any recognised header are skipped");
                    }
                    tracing::debug!(row = row_number, reason = %skip, "row skipped");
                    self.stats.record_skip(&skip);
                }
            }
        }
        Ok(())
    }
}

fn measure_record(index: &ColumnIndex, row: &[String]) -> Result<TaggedRecord, RowSkip> {
    let facility_id = index.require(row, columns::FACILITY_ID)?;
    let measure_name = index.require(row, columns::MEASURE_NAME)?;
    let excess_ratio = index.require(row, columns::EXCESS_RATIO)?;
    let num_readmissions = index.require(row, columns::NUM_READMISSIONS)?;

    if facility_id.is_empty() {
        return Err(RowSkip::MissingKey(columns::FACILITY_ID));
    }

    Ok(TaggedRecord::Measure(MeasureRecord {
        facility_id: facility_id.to_string(),
        fields: MeasureFields {
            measure_name: measure_name.to_string(),
            excess_ratio: excess_ratio.to_string(),
            num_readmissions: num_readmissions.to_string(),
        },
    }))
}

fn characteristic_record(index: &ColumnIndex, row: &[String]) -> Result<TaggedRecord, RowSkip> {
    let provider_number = index.require(row, columns::PROVIDER_NUMBER)?;
    let category = index.require(row, columns::CATEGORY_CODE)?;
    if category != ACUTE_CARE_CATEGORY {
        return Err(RowSkip::FilteredCategory(category.to_string()));
    }

    let attributes = FacilityAttributes {
        fips_state: zero_pad(index.resolve(row, fields::FIPS_STATE_CD)?, 2),
        fips_county: zero_pad(index.resolve(row, fields::FIPS_CNTY_CD)?, 3),
        certified_beds: index.resolve(row, fields::CRTFD_BED_CNT)?.to_string(),
        bed_count: index.resolve(row, fields::BED_CNT)?.to_string(),
        rn_count: index.resolve(row, fields::RN_CNT)?.to_string(),
        icu: index.resolve(row, fields::ICU_FLAG)?.to_string(),
        icu_service_code: index.resolve(row, fields::ICU_SRVC_CD)?.to_string(),
    };

    if provider_number.is_empty() {
        return Err(RowSkip::MissingKey(columns::PROVIDER_NUMBER));
    }

    Ok(TaggedRecord::Characteristic(CharacteristicRecord {
        provider_number: provider_number.to_string(),
        attributes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HRRP_HEADER: &[&str] = &[
        "Facility Name",
        "Facility ID",
        "State",
        "Measure Name",
        "Number of Discharges",
        "Excess Readmission Ratio",
        "Number of Readmissions",
    ];

    const POS_HEADER: &[&str] = &[
        "PRVDR_CTGRY_CD",
        "PRVDR_NUM",
        "FIPS_STATE_CD",
        "FIPS_CNTY_CD",
        "CRTFD_BED_CNT",
        "BEDS_CNT",
        "RN_CNT",
        "ICU_SRVC_IND",
    ];

    fn record(classifier: &mut Classifier, row: &[&str]) -> TaggedRecord {
        match classifier.classify(row) {
            Ok(RowOutcome::Record(record)) => record,
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[test]
    fn test_rows_before_header_are_skipped() {
        let mut classifier = Classifier::new();
        assert_eq!(
            classifier.classify(&["010001", "READM-30-AMI-HRRP"]),
            Err(RowSkip::NoSchema)
        );
        assert_eq!(classifier.schema(), None);
    }

    #[test]
    fn test_measure_row() {
        let mut classifier = Classifier::new();
        assert_eq!(
            classifier.classify(HRRP_HEADER),
            Ok(RowOutcome::Header(Schema::Measure))
        );

        let rec = record(
            &mut classifier,
            &["SOUTHEAST HEALTH", " 010001 ", "AL", "READM-30-AMI-HRRP", "296", "0.9483", "N/A"],
        );
        assert_eq!(rec.to_string(), "010001\tHRRP|READM-30-AMI-HRRP|0.9483|N/A");
    }

    #[test]
    fn test_measure_blank_cells_pass_through_empty() {
        let mut classifier = Classifier::new();
        classifier.classify(HRRP_HEADER).unwrap();

        let rec = record(&mut classifier, &["X", "010001", "AL", "READM-30-HF-HRRP", "", "", ""]);
        assert_eq!(rec.payload(), "HRRP|READM-30-HF-HRRP||");
    }

    #[test]
    fn test_measure_missing_facility_id() {
        let mut classifier = Classifier::new();
        classifier.classify(HRRP_HEADER).unwrap();

        assert_eq!(
            classifier.classify(&["X", "", "AL", "READM-30-HF-HRRP", "1", "1.0", "5"]),
            Err(RowSkip::MissingKey("Facility ID"))
        );
    }

    #[test]
    fn test_short_row_is_skipped() {
        let mut classifier = Classifier::new();
        classifier.classify(HRRP_HEADER).unwrap();

        let result = classifier.classify(&["X", "010001", "AL", "READM-30-HF-HRRP"]);
        assert!(matches!(result, Err(RowSkip::ShortRow { .. })));
    }

    #[test]
    fn test_characteristic_row_with_fallback_columns() {
        let mut classifier = Classifier::new();
        assert_eq!(
            classifier.classify(POS_HEADER),
            Ok(RowOutcome::Header(Schema::Characteristic))
        );

        let rec = record(&mut classifier, &["01", "010001", "1", "67", "420", "430", "312", "Y"]);
        assert_eq!(rec.to_string(), "010001\tPOS|01|067|420|430|312||Y");
    }

    #[test]
    fn test_characteristic_preferred_columns() {
        let header = [
            "PRVDR_NUM",
            "PRVDR_CTGRY_CD",
            "FIPS_STATE_CD",
            "FIPS_CNTY_CD",
            "BEDS_CNT",
            "BED_CNT",
            "ICU",
            "ICU_SRVC_IND",
            "ICU_SRVC_CD",
        ];
        let mut classifier = Classifier::new();
        classifier.classify(&header).unwrap();

        let rec = record(&mut classifier, &["010001", "01", "6", "37", "80", "120", "1", "N", "3"]);
        assert_eq!(rec.payload(), "POS|06|037||120||1|3");
    }

    #[test]
    fn test_characteristic_category_filter() {
        let mut classifier = Classifier::new();
        classifier.classify(POS_HEADER).unwrap();

        assert_eq!(
            classifier.classify(&["05", "010001", "1", "67", "", "", "", ""]),
            Err(RowSkip::FilteredCategory("05".into()))
        );
        assert_eq!(
            classifier.classify(&["1", "010001", "1", "67", "", "", "", ""]),
            Err(RowSkip::FilteredCategory("1".into()))
        );
    }

    #[test]
    fn test_characteristic_blank_fips_not_padded() {
        let mut classifier = Classifier::new();
        classifier.classify(POS_HEADER).unwrap();

        let rec = record(&mut classifier, &["01", "010001", "", " ", "", "", "", ""]);
        assert_eq!(rec.payload(), "POS|||||||");
    }

    #[test]
    fn test_characteristic_missing_provider() {
        let mut classifier = Classifier::new();
        classifier.classify(POS_HEADER).unwrap();

        assert_eq!(
            classifier.classify(&["01", "", "1", "67", "", "", "", ""]),
            Err(RowSkip::MissingKey("PRVDR_NUM"))
        );
    }

    #[test]
    fn test_header_switches_schema_mid_stream() {
        let mut classifier = Classifier::new();
        classifier.classify(POS_HEADER).unwrap();
        record(&mut classifier, &["01", "010001", "1", "67", "", "", "", ""]);

        classifier.classify(HRRP_HEADER).unwrap();
        assert_eq!(classifier.schema(), Some(Schema::Measure));
        let rec = record(&mut classifier, &["X", "010001", "AL", "m", "1", "1.0", "5"]);
        assert_eq!(rec.tag(), crate::models::Tag::Measure);
    }

    #[test]
    fn test_empty_row() {
        let mut classifier = Classifier::new();
        classifier.classify(POS_HEADER).unwrap();
        assert_eq!(classifier.classify::<&str>(&[]), Err(RowSkip::Empty));
        assert_eq!(classifier.classify(&["", " ", ""]), Err(RowSkip::Empty));
        // State survives empty rows
        assert_eq!(classifier.schema(), Some(Schema::Characteristic));
    }

    #[test]
    fn test_run_counts_outcomes() {
        let rows = vec![
            vec!["junk", "row"],
            POS_HEADER.to_vec(),
            vec!["01", "010001", "1", "67", "", "", "", ""],
            vec!["02", "010002", "1", "67", "", "", "", ""],
            vec![],
            HRRP_HEADER.to_vec(),
            vec!["X", "010001", "AL", "m", "1", "1.0", "5"],
            vec!["X", "", "AL", "m", "1", "1.0", "5"],
        ];
        let rows = rows
            .into_iter()
            .map(|r| Ok(r.into_iter().map(String::from).collect()));

        let mut emitted = Vec::new();
        let mut classifier = Classifier::new();
        classifier
            .run(rows, |record| {
                emitted.push(record.to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(emitted, vec!["010001\tPOS|01|067|||||", "010001\tHRRP|m|1.0|5"]);

        let stats = classifier.into_stats();
        assert_eq!(stats.rows_read, 8);
        assert_eq!(stats.measure_headers, 1);
        assert_eq!(stats.characteristic_headers, 1);
        assert_eq!(stats.records_emitted(), 2);
        assert_eq!(stats.rows_before_header, 1);
        assert_eq!(stats.filtered_category, 1);
        assert_eq!(stats.empty_rows, 1);
        assert_eq!(stats.missing_keys, 1);
        assert_eq!(stats.rows_skipped(), 4);
    }
}
