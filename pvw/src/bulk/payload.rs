//! Row to Purview payload mapping
//!
//! Lineage rows become Atlas `Process` entities whose inputs and outputs
//! point at the referenced datasets. Qualified names are derived from the
//! row content only, so resubmitting a row upserts the same entity.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;

use super::row::Row;
use super::template::{PayloadKind, Template};

/// Atlas type used for lineage processes
pub const PROCESS_TYPE: &str = "Process";

/// Atlas type used for placeholder datasets created for missing references
pub const PLACEHOLDER_TYPE: &str = "DataSet";

/// Negative guid marking an entity Purview should assign a guid to
const NEW_ENTITY_GUID: &str = "-1";

/// A write ready to dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Upsert of a full entity
    Entity(Value),
    /// Single attribute replacement on an existing entity
    AttributeUpdate { guid: String, attribute: String, value: Value },
}

/// Entity reference value from the CSV mapped to the guid to use
pub type ResolvedRefs = HashMap<String, String>;

/// Build the payload for a validated row
///
/// `refs` maps raw reference values to resolved guids; unresolved references
/// are used as guids unchanged.
pub fn build_payload(template: &Template, row: &Row, refs: &ResolvedRefs) -> Result<Payload, String> {
    debug!(template = template.name, row = row.number, "build_payload: called");
    let guid_of = |field: &str| -> Result<String, String> {
        let raw = row.text(field).ok_or_else(|| format!("missing value for {}", field))?;
        Ok(refs.get(raw).cloned().unwrap_or_else(|| raw.to_string()))
    };

    match template.kind {
        PayloadKind::Lineage => {
            let source = guid_of("source")?;
            let target = guid_of("target")?;
            Ok(Payload::Entity(lineage_process(template, row, &source, &target)))
        }
        PayloadKind::ColumnLineage => {
            let source = guid_of("source")?;
            let target = guid_of("target")?;
            Ok(Payload::Entity(column_process(template, row, &source, &target)?))
        }
        PayloadKind::AttributeUpdate => {
            let guid = guid_of("guid")?;
            let attribute = row.text("attribute").ok_or("missing value for attribute")?.to_string();
            let value = row.text("value").ok_or("missing value for value")?;
            Ok(Payload::AttributeUpdate {
                guid,
                attribute,
                value: Value::String(value.to_string()),
            })
        }
    }
}

/// Placeholder dataset for a reference that does not exist yet
pub fn placeholder_entity(reference: &str) -> Value {
    json!({
        "guid": NEW_ENTITY_GUID,
        "typeName": PLACEHOLDER_TYPE,
        "attributes": {
            "qualifiedName": format!("pvw://placeholder/{}", reference),
            "name": reference,
        },
    })
}

fn lineage_process(template: &Template, row: &Row, source: &str, target: &str) -> Value {
    let qualifier = row
        .text("type")
        .or_else(|| row.text("process_name"))
        .unwrap_or(template.name);
    let qualified_name = format!("pvw://{}/{}/{}/{}", template.name, qualifier, source, target);
    let name = row
        .text("process_name")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}: {} -> {}", qualifier, source, target));

    let mut entity = process_entity(&qualified_name, &name, source, target);
    set_optional(&mut entity, "description", row.text("description"));
    set_optional(&mut entity, "owner", row.text("owner"));

    let mut custom = serde_json::Map::new();
    for field in ["type", "process_type"] {
        if let Some(v) = row.text(field) {
            custom.insert(field.to_string(), json!(v));
        }
    }
    if let Some(minutes) = row.get("schedule_minutes").and_then(|v| v.as_int()) {
        custom.insert("schedule_minutes".to_string(), json!(minutes.to_string()));
    }
    if !custom.is_empty() {
        entity["customAttributes"] = Value::Object(custom);
    }

    entity
}

fn column_process(template: &Template, row: &Row, source: &str, target: &str) -> Result<Value, String> {
    let source_column = row.text("source_column").ok_or("missing value for source_column")?;
    let target_column = row.text("target_column").ok_or("missing value for target_column")?;

    let qualified_name = format!(
        "pvw://{}/{}/{}/{}/{}",
        template.name, source, target, source_column, target_column
    );
    let name = row
        .text("process_name")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} -> {}", source_column, target_column));

    let mut column = json!({ "Source": source_column, "Sink": target_column });
    if let Some(transformation) = row.text("transformation") {
        column["Transformation"] = json!(transformation);
    }
    // Purview expects the mapping as a JSON-encoded string attribute
    let mapping = json!([{
        "DatasetMapping": { "Source": source, "Sink": target },
        "ColumnMapping": [column],
    }]);

    let mut entity = process_entity(&qualified_name, &name, source, target);
    entity["attributes"]["columnMapping"] = json!(mapping.to_string());
    Ok(entity)
}

fn process_entity(qualified_name: &str, name: &str, source: &str, target: &str) -> Value {
    json!({
        "guid": NEW_ENTITY_GUID,
        "typeName": PROCESS_TYPE,
        "attributes": {
            "qualifiedName": qualified_name,
            "name": name,
            "inputs": [{ "guid": source }],
            "outputs": [{ "guid": target }],
        },
    })
}

fn set_optional(entity: &mut Value, attribute: &str, value: Option<&str>) {
    if let Some(v) = value {
        entity["attributes"][attribute] = json!(v);
    }
}
