//! Typed rows produced by the validator

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::template::{FieldKind, Template};

/// A typed cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    /// One of the template's allowed values
    Enum(String),
}

impl FieldValue {
    /// Parse a raw, non-empty cell according to its field kind
    pub fn parse(raw: &str, kind: &FieldKind) -> Result<Self, FieldError> {
        match kind {
            FieldKind::String => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Int => raw.parse::<i64>().map(FieldValue::Int).map_err(|_| FieldError::InvalidType),
            FieldKind::Enum(allowed) => {
                if allowed.contains(&raw) {
                    Ok(FieldValue::Enum(raw.to_string()))
                } else {
                    Err(FieldError::InvalidValue { allowed: *allowed })
                }
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Enum(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Enum(s) => f.write_str(s),
            FieldValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Why a single cell was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Missing,
    InvalidType,
    InvalidValue { allowed: &'static [&'static str] },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Missing => f.write_str("required field missing"),
            FieldError::InvalidType => f.write_str("invalid type, expected integer"),
            FieldError::InvalidValue { allowed } => {
                write!(f, "invalid value, expected one of {{{}}}", allowed.join(", "))
            }
        }
    }
}

/// One validated input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// 1-based data row number (the header is not counted)
    pub number: usize,
    /// Line in the source file where the record starts
    pub line: usize,
    /// Non-empty template fields only
    pub values: BTreeMap<String, FieldValue>,
}

impl Row {
    pub fn new(number: usize, line: usize) -> Self {
        Self {
            number,
            line,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: FieldValue) -> Self {
        self.values.insert(field.to_string(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// String form of a field, for text and enum fields
    pub fn text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(FieldValue::as_str)
    }

    /// Cells in template column order; absent fields are empty
    pub fn to_record(&self, template: &Template) -> Vec<String> {
        template
            .field_names()
            .map(|name| self.values.get(name).map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::template::{BASIC, LINEAGE_TYPES};

    #[test]
    fn test_parse_by_kind() {
        assert_eq!(
            FieldValue::parse("abc", &FieldKind::String).unwrap(),
            FieldValue::Text("abc".to_string())
        );
        assert_eq!(FieldValue::parse("-42", &FieldKind::Int).unwrap(), FieldValue::Int(-42));
        assert_eq!(FieldValue::parse("4.2", &FieldKind::Int), Err(FieldError::InvalidType));
        assert_eq!(
            FieldValue::parse("Copy", &FieldKind::Enum(LINEAGE_TYPES)).unwrap(),
            FieldValue::Enum("Copy".to_string())
        );
        assert!(FieldValue::parse("copy", &FieldKind::Enum(LINEAGE_TYPES)).is_err());
    }

    #[test]
    fn test_field_error_messages() {
        assert_eq!(FieldError::Missing.to_string(), "required field missing");
        assert_eq!(FieldError::InvalidType.to_string(), "invalid type, expected integer");
        let msg = FieldError::InvalidValue { allowed: &["A", "B"] }.to_string();
        assert_eq!(msg, "invalid value, expected one of {A, B}");
    }

    #[test]
    fn test_to_record_follows_template_order() {
        let row = Row::new(1, 2)
            .with("type", FieldValue::Enum("DataFlow".to_string()))
            .with("source", FieldValue::Text("A".to_string()))
            .with("target", FieldValue::Text("B".to_string()));

        assert_eq!(row.to_record(&BASIC), vec!["A", "B", "DataFlow", "", ""]);
        assert_eq!(row.text("source"), Some("A"));
        assert_eq!(row.text("description"), None);
    }
}
