//! Built-in record templates
//!
//! A template names the CSV columns a bulk file may carry, which of them are
//! required, how each value is typed, which columns reference existing
//! Purview entities, and what kind of write a row turns into. The table is a
//! process-wide constant.

use serde::Serialize;

use super::error::{BulkError, Result};

/// Lineage relationship kinds accepted by the `basic` template
pub const LINEAGE_TYPES: &[&str] = &["DataFlow", "Process", "Copy", "Transformation", "Reference"];

/// Process kinds accepted by the `etl` template
pub const PROCESS_TYPES: &[&str] = &["ETL", "ELT", "Copy", "StoredProcedure", "Notebook"];

/// How a raw CSV value is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "allowed", rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int,
    Enum(&'static [&'static str]),
}

/// One column of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: true,
            kind,
        }
    }

    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: false,
            kind,
        }
    }
}

/// What a validated row becomes when dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// A Process entity linking source to target
    Lineage,
    /// A Process entity carrying a column-level mapping
    ColumnLineage,
    /// A single attribute replaced on an existing entity
    AttributeUpdate,
}

/// A named record shape
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
    /// Columns holding guids of entities the row depends on
    pub entity_refs: &'static [&'static str],
    pub kind: PayloadKind,
}

impl Template {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

pub static BASIC: Template = Template {
    name: "basic",
    description: "Source to target lineage with a relationship type",
    fields: &[
        FieldSpec::required("source", FieldKind::String),
        FieldSpec::required("target", FieldKind::String),
        FieldSpec::required("type", FieldKind::Enum(LINEAGE_TYPES)),
        FieldSpec::optional("process_name", FieldKind::String),
        FieldSpec::optional("description", FieldKind::String),
    ],
    entity_refs: &["source", "target"],
    kind: PayloadKind::Lineage,
};

pub static ETL: Template = Template {
    name: "etl",
    description: "Lineage through a named ETL process",
    fields: &[
        FieldSpec::required("source", FieldKind::String),
        FieldSpec::required("target", FieldKind::String),
        FieldSpec::required("process_name", FieldKind::String),
        FieldSpec::required("process_type", FieldKind::Enum(PROCESS_TYPES)),
        FieldSpec::optional("owner", FieldKind::String),
        FieldSpec::optional("schedule_minutes", FieldKind::Int),
        FieldSpec::optional("description", FieldKind::String),
    ],
    entity_refs: &["source", "target"],
    kind: PayloadKind::Lineage,
};

pub static COLUMN_MAPPING: Template = Template {
    name: "column-mapping",
    description: "Column-level lineage between two datasets",
    fields: &[
        FieldSpec::required("source", FieldKind::String),
        FieldSpec::required("target", FieldKind::String),
        FieldSpec::required("source_column", FieldKind::String),
        FieldSpec::required("target_column", FieldKind::String),
        FieldSpec::optional("transformation", FieldKind::String),
        FieldSpec::optional("process_name", FieldKind::String),
    ],
    entity_refs: &["source", "target"],
    kind: PayloadKind::ColumnLineage,
};

pub static ENTITY_UPDATE: Template = Template {
    name: "entity-update",
    description: "Set one attribute on an existing entity",
    fields: &[
        FieldSpec::required("guid", FieldKind::String),
        FieldSpec::required("attribute", FieldKind::String),
        FieldSpec::required("value", FieldKind::String),
    ],
    entity_refs: &["guid"],
    kind: PayloadKind::AttributeUpdate,
};

static TEMPLATES: &[&Template] = &[&BASIC, &ETL, &COLUMN_MAPPING, &ENTITY_UPDATE];

/// Look up a built-in template by name
pub fn get_template(name: &str) -> Result<&'static Template> {
    TEMPLATES
        .iter()
        .copied()
        .find(|t| t.name == name)
        .ok_or_else(|| BulkError::UnknownTemplate {
            name: name.to_string(),
            available: list_templates().iter().map(|s| s.to_string()).collect(),
        })
}

/// Names of all built-in templates, in registration order
pub fn list_templates() -> Vec<&'static str> {
    TEMPLATES.iter().map(|t| t.name).collect()
}

/// All built-in templates
pub fn templates() -> &'static [&'static Template] {
    TEMPLATES
}
