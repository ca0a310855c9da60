use std::collections::BTreeMap;

use core::hash::row_hash;
use core::semantic_type::SemanticType;
use core::source_spec::{Coercion, SourceSpec};
use core::value::{coerce, Value};

use crate::reader::RawRecord;

/// A record that coerced cleanly: every field, plus the computed
/// `etl_row_hash`, ready for staging.
#[derive(Clone, Debug)]
pub struct ValidRecord {
    pub fields: Vec<(String, Value)>,
    pub row_hash: u32,
}

/// One field's coercion failure: the file's column alias, the raw value
/// that didn't parse, and why - spec.md §4.3 step 5's
/// `{column_name (alias), column_value, error_kind, error_message}`.
#[derive(Clone, Debug)]
pub struct FieldError {
    pub column_alias: String,
    pub column_value: String,
    pub error_kind: String,
    pub error_message: String,
}

/// A row that failed validation: its 1-based position in the file, the
/// subset of the original record restricted to the failing fields union
/// the grain fields (so a reprocessing operator can identify which
/// logical record broke without the whole row), and every field error
/// found in this pass - not just the first.
#[derive(Clone, Debug)]
pub struct FailedRecord {
    pub row_number: usize,
    pub record: BTreeMap<String, String>,
    pub errors: Vec<FieldError>,
}

/// One row's outcome: either every declared field coerced, or one-or-more
/// coercion failures. Unlike a fail-fast validator, every field is
/// checked so a row with two bad columns reports both, matching spec.md
/// §4.3's "structured *list* of error descriptors."
pub enum ValidationOutcome {
    Valid(ValidRecord),
    Failed(FailedRecord),
}

/// Validates one raw record against `spec`'s fields in a single pass:
/// coerce every field (collecting failures rather than stopping at the
/// first), apply coercions, and - if every field succeeded - compute the
/// row hash. This generalises the original's implicit Pydantic validation
/// (one exception per bad record, caught by `_process_file`'s loop) into
/// an explicit tagged union the caller can tally without `try`/`except`.
pub fn validate(raw: &RawRecord, spec: &SourceSpec, row_number: usize) -> ValidationOutcome {
    let mut fields = Vec::with_capacity(spec.fields().len());
    let mut errors = Vec::new();
    let mut failing_columns = Vec::new();

    for field in spec.fields() {
        let alias_key = field.alias().to_ascii_lowercase();
        let raw_value = raw.get(&alias_key).cloned().unwrap_or_default();

        let mut value = match coerce(&raw_value, field.semantic_type()) {
            Ok(v) => v,
            Err(reason) => {
                errors.push(FieldError {
                    column_alias: field.alias().to_string(),
                    column_value: raw_value,
                    error_kind: "coercion_failed".to_string(),
                    error_message: format!("cannot be coerced to {}: {reason}", field.semantic_type()),
                });
                failing_columns.push(field.name().to_string());
                continue;
            }
        };

        if !matches!(value, Value::Null) {
            value = apply_coercions(value, field.coercions());
        }

        fields.push((field.name().to_string(), value));
    }

    if !errors.is_empty() {
        let mut wanted: Vec<&str> = failing_columns.iter().map(String::as_str).collect();
        wanted.extend(spec.grain().iter().map(String::as_str));

        let record: BTreeMap<String, String> = spec
            .fields()
            .iter()
            .filter(|f| wanted.contains(&f.name()))
            .map(|f| (f.name().to_string(), raw.get(&f.alias().to_ascii_lowercase()).cloned().unwrap_or_default()))
            .collect();

        return ValidationOutcome::Failed(FailedRecord { row_number, record, errors });
    }

    let hash = row_hash(&fields);
    ValidationOutcome::Valid(ValidRecord { fields, row_hash: hash })
}

fn apply_coercions(value: Value, coercions: &[Coercion]) -> Value {
    let Value::String(mut s) = value else { return value };

    for coercion in coercions {
        s = match coercion {
            Coercion::Trim => s.trim().to_string(),
            Coercion::Lowercase => s.to_lowercase(),
            Coercion::StripNonDigits => s.chars().filter(char::is_ascii_digit).collect(),
            Coercion::MaxLength(n) => s.chars().take(*n).collect(),
        };
    }

    Value::String(s)
}

/// Accumulates outcomes over a file's records and decides, once the file
/// is exhausted, whether the failure rate breached `spec`'s
/// `validation_threshold` - mirroring the original's
/// `ValidationThresholdExceededError`, raised only after the full loop.
#[derive(Default)]
pub struct ValidationTally {
    pub processed: usize,
    pub failed: usize,
    pub sample_errors: Vec<FailedRecord>,
}

const SAMPLE_ERROR_CAP: usize = 5;

impl ValidationTally {
    pub fn record(&mut self, outcome: &ValidationOutcome) {
        self.processed += 1;
        if let ValidationOutcome::Failed(failure) = outcome {
            self.failed += 1;
            if self.sample_errors.len() < SAMPLE_ERROR_CAP {
                self.sample_errors.push(failure.clone());
            }
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.failed as f64 / self.processed as f64
        }
    }

    pub fn exceeds(&self, threshold: f64) -> bool {
        self.failure_rate() > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::dialect::Dialect;
    use core::source_spec::{FieldSpec, SourceFormat};

    fn spec() -> SourceSpec {
        SourceSpec::new(
            "sales",
            "sales_*.csv",
            "transactions",
            vec!["id".to_string()],
            vec![
                FieldSpec::new("id", SemanticType::String).with_coercion(Coercion::Trim),
                FieldSpec::new("amount", SemanticType::Decimal),
                FieldSpec::new("memo", SemanticType::optional(SemanticType::String)),
            ],
            SourceFormat::Delimited { delimiter: b',', skip_rows: 0 },
            Dialect::Postgres,
        )
    }

    #[test]
    fn valid_record_computes_a_hash() {
        let mut raw = RawRecord::new();
        raw.insert("id".to_string(), " 1 ".to_string());
        raw.insert("amount".to_string(), "10.50".to_string());
        raw.insert("memo".to_string(), String::new());

        match validate(&raw, &spec(), 1) {
            ValidationOutcome::Valid(record) => {
                assert_eq!(record.fields[0], ("id".to_string(), Value::String("1".to_string())));
            }
            ValidationOutcome::Failed(_) => panic!("expected a valid record"),
        }
    }

    #[test]
    fn bad_decimal_fails_on_the_amount_column() {
        let mut raw = RawRecord::new();
        raw.insert("id".to_string(), "1".to_string());
        raw.insert("amount".to_string(), "not-a-number".to_string());

        match validate(&raw, &spec(), 2) {
            ValidationOutcome::Failed(failure) => {
                assert_eq!(failure.row_number, 2);
                assert_eq!(failure.errors.len(), 1);
                assert_eq!(failure.errors[0].column_alias, "amount");
                assert!(failure.record.contains_key("id"), "grain field kept in the record subset");
                assert!(failure.record.contains_key("amount"), "failing field kept in the record subset");
            }
            ValidationOutcome::Valid(_) => panic!("expected a failure"),
        }
    }

    #[test]
    fn every_failing_field_is_reported_not_just_the_first() {
        let mut raw = RawRecord::new();
        raw.insert("id".to_string(), "1".to_string());
        raw.insert("amount".to_string(), "not-a-number".to_string());

        let spec = SourceSpec::new(
            "sales",
            "sales_*.csv",
            "transactions",
            vec!["id".to_string()],
            vec![
                FieldSpec::new("id", SemanticType::String),
                FieldSpec::new("amount", SemanticType::Decimal),
                FieldSpec::new("quantity", SemanticType::Int),
            ],
            SourceFormat::Delimited { delimiter: b',', skip_rows: 0 },
            Dialect::Postgres,
        );

        match validate(&raw, &spec, 1) {
            ValidationOutcome::Failed(failure) => assert_eq!(failure.errors.len(), 2),
            ValidationOutcome::Valid(_) => panic!("expected a failure"),
        }
    }

    #[test]
    fn tally_reports_threshold_breach_only_after_the_full_pass() {
        let mut tally = ValidationTally::default();
        let mut raw_good = RawRecord::new();
        raw_good.insert("id".to_string(), "1".to_string());
        raw_good.insert("amount".to_string(), "1.00".to_string());
        let mut raw_bad = RawRecord::new();
        raw_bad.insert("id".to_string(), "1".to_string());
        raw_bad.insert("amount".to_string(), "x".to_string());

        tally.record(&validate(&raw_good, &spec(), 1));
        tally.record(&validate(&raw_bad, &spec(), 2));
        tally.record(&validate(&raw_bad, &spec(), 3));

        assert_eq!(tally.processed, 3);
        assert_eq!(tally.failed, 2);
        assert!(tally.exceeds(0.05));
    }
}
