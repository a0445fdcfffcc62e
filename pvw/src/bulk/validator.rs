//! CSV validation against a template
//!
//! Validation is exhaustive: every row is checked and every problem is
//! reported, so a file can be fixed in a single pass. Nothing here touches
//! the network.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::error::{BulkError, Result};
use super::row::{FieldError, FieldValue, Row};
use super::template::{Template, get_template};

/// A problem found in one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub row: usize,
    /// None when the whole record could not be read
    pub field: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "row {}: {}: {}", self.row, field, self.message),
            None => write!(f, "row {}: {}", self.row, self.message),
        }
    }
}

/// Outcome of validating one file
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub template: &'static str,
    pub total_rows: usize,
    pub errors: Vec<ValidationError>,
    /// Rows with no errors, in file order
    pub rows: Vec<Row>,
    /// Rows with errors, holding their raw cells as text so they can be
    /// written back out for correction
    pub rejected: Vec<Row>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn invalid_row_count(&self) -> usize {
        self.total_rows - self.rows.len()
    }

    /// Errors for one row, in the order they were found
    pub fn errors_for(&self, row: usize) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.row == row)
    }

    /// All messages for one row joined with `; `, None if the row is valid
    pub fn error_message(&self, row: usize) -> Option<String> {
        let messages: Vec<String> = self
            .errors_for(row)
            .map(|e| match &e.field {
                Some(field) => format!("{}: {}", field, e.message),
                None => e.message.clone(),
            })
            .collect();
        (!messages.is_empty()).then(|| messages.join("; "))
    }

    /// Rejected rows paired with their joined error messages
    pub fn rejections(&self) -> impl Iterator<Item = (&Row, String)> {
        self.rejected
            .iter()
            .map(|row| (row, self.error_message(row.number).unwrap_or_default()))
    }
}

/// Validate a CSV file against a named template
pub fn validate(path: impl AsRef<Path>, template_name: &str) -> Result<ValidationResult> {
    let path = path.as_ref();
    debug!(path = %path.display(), %template_name, "validate: called");
    let template = get_template(template_name)?;

    let file = File::open(path).map_err(|source| BulkError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    let result = validate_reader(file, template, &path.display().to_string())?;
    info!(
        path = %path.display(),
        template = template.name,
        total = result.total_rows,
        errors = result.errors.len(),
        "Validation complete"
    );
    Ok(result)
}

/// Validate CSV from any reader; `source_name` is used in error messages
pub fn validate_reader<R: Read>(reader: R, template: &'static Template, source_name: &str) -> Result<ValidationResult> {
    debug!(template = template.name, %source_name, "validate_reader: called");
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(BulkError::MissingHeader {
            source_name: source_name.to_string(),
        });
    }

    // First occurrence wins when a header repeats; unknown columns are ignored
    let mut columns: HashMap<&str, usize> = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        columns.entry(name).or_insert(idx);
    }
    for field in template.required_fields() {
        if !columns.contains_key(field.name) {
            debug!(field = field.name, "validate_reader: required column absent from header");
        }
    }

    let mut total_rows = 0;
    let mut errors = Vec::new();
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for (idx, record) in csv_reader.records().enumerate() {
        let number = idx + 1;
        total_rows += 1;

        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!(row = number, error = %e, "validate_reader: unreadable record");
                let line = e.position().map(|p| p.line() as usize).unwrap_or(number + 1);
                errors.push(ValidationError {
                    row: number,
                    field: None,
                    message: format!("malformed record: {}", e),
                });
                rejected.push(Row::new(number, line));
                continue;
            }
        };

        let line = record.position().map(|p| p.line() as usize).unwrap_or(number + 1);
        let mut row = Row::new(number, line);
        let mut raw_row = Row::new(number, line);
        let mut row_ok = true;

        for field in template.fields {
            let raw = columns
                .get(field.name)
                .and_then(|&i| record.get(i))
                .filter(|v| !v.is_empty());

            if let Some(raw) = raw {
                raw_row.values.insert(field.name.to_string(), FieldValue::Text(raw.to_string()));
            }

            let outcome = match raw {
                Some(raw) => FieldValue::parse(raw, &field.kind).map(Some),
                None if field.required => Err(FieldError::Missing),
                None => Ok(None),
            };

            match outcome {
                Ok(Some(value)) => {
                    row.values.insert(field.name.to_string(), value);
                }
                Ok(None) => {}
                Err(e) => {
                    row_ok = false;
                    errors.push(ValidationError {
                        row: number,
                        field: Some(field.name.to_string()),
                        message: e.to_string(),
                    });
                }
            }
        }

        if row_ok {
            rows.push(row);
        } else {
            rejected.push(raw_row);
        }
    }

    debug!(total_rows, errors = errors.len(), valid = rows.len(), "validate_reader: done");
    Ok(ValidationResult {
        template: template.name,
        total_rows,
        errors,
        rows,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::template::{BASIC, ETL, LINEAGE_TYPES};
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn check(csv: &str, template: &'static Template) -> ValidationResult {
        validate_reader(csv.as_bytes(), template, "test").unwrap()
    }

    #[test]
    fn test_valid_file() {
        let result = check("source,target,type\nA,B,DataFlow\nC,D,Copy\n", &BASIC);

        assert!(result.is_valid());
        assert_eq!(result.total_rows, 2);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].number, 1);
        assert_eq!(result.rows[0].line, 2);
        assert_eq!(result.rows[1].text("target"), Some("D"));
        assert_eq!(result.template, "basic");
    }

    #[test]
    fn test_missing_required_value() {
        let result = check("source,target,type\nA,,DataFlow\n", &BASIC);

        assert_eq!(result.errors.len(), 1);
        let err = &result.errors[0];
        assert_eq!(err.row, 1);
        assert_eq!(err.field.as_deref(), Some("target"));
        assert_eq!(err.message, "required field missing");
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_absent_required_column_reported_per_row() {
        let result = check("source,type\nA,DataFlow\nB,Copy\n", &BASIC);

        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.field.as_deref() == Some("target")));
        assert_eq!(result.errors[0].row, 1);
        assert_eq!(result.errors[1].row, 2);
        assert_eq!(result.invalid_row_count(), 2);
    }

    #[test]
    fn test_invalid_enum_value() {
        let result = check("source,target,type\nA,B,Pipeline\n", &BASIC);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field.as_deref(), Some("type"));
        assert!(result.errors[0].message.starts_with("invalid value, expected one of {"));
        for allowed in LINEAGE_TYPES {
            assert!(result.errors[0].message.contains(allowed));
        }
    }

    #[test]
    fn test_invalid_int() {
        let csv = "source,target,process_name,process_type,schedule_minutes\nA,B,nightly,ETL,hourly\n";
        let result = check(csv, &ETL);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field.as_deref(), Some("schedule_minutes"));
        assert!(result.errors[0].message.starts_with("invalid type"));
    }

    #[test]
    fn test_optional_int_parsed() {
        let csv = "source,target,process_name,process_type,schedule_minutes\nA,B,nightly,ETL,60\nA,B,hourly,ELT,\n";
        let result = check(csv, &ETL);

        assert!(result.is_valid());
        assert_eq!(result.rows[0].get("schedule_minutes"), Some(&FieldValue::Int(60)));
        assert_eq!(result.rows[1].get("schedule_minutes"), None);
    }

    #[test]
    fn test_multiple_errors_in_one_row_and_exhaustive() {
        let csv = "source,target,type\n,,Bogus\nA,B,DataFlow\n,B,\n";
        let result = check(csv, &BASIC);

        assert_eq!(result.errors_for(1).count(), 3);
        assert_eq!(result.errors_for(2).count(), 0);
        assert_eq!(result.errors_for(3).count(), 2);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].number, 2);
    }

    #[test]
    fn test_rejected_rows_keep_raw_cells_and_line() {
        // The first record spans two lines, so the rejected row starts on line 4
        let csv = "source,target,type\n\"multi\nline\",B,DataFlow\nC,,Bogus\n";
        let result = check(csv, &BASIC);

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rejected.len(), 1);
        let rejected = &result.rejected[0];
        assert_eq!(rejected.number, 2);
        assert_eq!(rejected.line, 4);
        assert_eq!(rejected.text("source"), Some("C"));
        assert_eq!(rejected.text("type"), Some("Bogus"));
        assert_eq!(rejected.get("target"), None);

        let (row, message) = result.rejections().next().unwrap();
        assert_eq!(row.number, 2);
        assert!(message.starts_with("target: required field missing; type: invalid value"));
        assert_eq!(result.error_message(1), None);
    }

    #[test]
    fn test_unknown_columns_ignored_and_case_sensitive_headers() {
        let result = check("source,target,type,error,Extra\nA,B,DataFlow,boom,x\n", &BASIC);
        assert!(result.is_valid());
        assert!(result.rows[0].get("error").is_none());

        // `Target` does not match `target`
        let result = check("source,Target,type\nA,B,DataFlow\n", &BASIC);
        assert_eq!(result.errors[0].field.as_deref(), Some("target"));
    }

    #[test]
    fn test_short_row_treated_as_missing() {
        let result = check("source,target,type\nA,B\n", &BASIC);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field.as_deref(), Some("type"));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let result = check("source , target , type\n A , B , DataFlow \n", &BASIC);
        assert!(result.is_valid());
        assert_eq!(result.rows[0].text("source"), Some("A"));
    }

    #[test]
    fn test_header_only_file() {
        let result = check("source,target,type\n", &BASIC);
        assert!(result.is_valid());
        assert_eq!(result.total_rows, 0);
    }

    #[test]
    fn test_empty_file_is_missing_header() {
        let err = validate_reader("".as_bytes(), &BASIC, "empty.csv").unwrap_err();
        assert!(matches!(err, BulkError::MissingHeader { .. }));
    }

    #[test]
    fn test_validate_file_not_found() {
        let err = validate("/nonexistent/lineage.csv", "basic").unwrap_err();
        assert!(matches!(err, BulkError::FileNotFound { .. }));
    }

    #[test]
    fn test_validate_unknown_template_checked_first() {
        let err = validate("/nonexistent/lineage.csv", "nope").unwrap_err();
        assert!(matches!(err, BulkError::UnknownTemplate { .. }));
    }

    #[test]
    fn test_validate_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lineage.csv");
        fs::write(&path, "source,target,type\nA,B,DataFlow\n").unwrap();

        let result = validate(&path, "basic").unwrap();
        assert!(result.is_valid());
        assert_eq!(result.rows.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_valid_rows_always_pass(
            rows in prop::collection::vec(("[a-z0-9-]{1,12}", "[a-z0-9-]{1,12}", 0..LINEAGE_TYPES.len()), 0..40)
        ) {
            let mut csv = String::from("source,target,type\n");
            for (s, t, k) in &rows {
                csv.push_str(&format!("{},{},{}\n", s, t, LINEAGE_TYPES[*k]));
            }

            let result = validate_reader(csv.as_bytes(), &BASIC, "prop").unwrap();
            prop_assert!(result.errors.is_empty());
            prop_assert_eq!(result.rows.len(), rows.len());
            prop_assert_eq!(result.total_rows, rows.len());
        }

        #[test]
        fn prop_missing_target_yields_one_error_per_row(
            sources in prop::collection::vec("[a-z]{1,8}", 1..20)
        ) {
            let mut csv = String::from("source,target,type\n");
            for s in &sources {
                csv.push_str(&format!("{},,DataFlow\n", s));
            }

            let result = validate_reader(csv.as_bytes(), &BASIC, "prop").unwrap();
            prop_assert_eq!(result.errors.len(), sources.len());
            for (i, err) in result.errors.iter().enumerate() {
                prop_assert_eq!(err.row, i + 1);
                prop_assert_eq!(err.field.as_deref(), Some("target"));
            }
        }
    }
}
