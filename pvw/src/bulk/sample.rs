//! Sample CSV generation

use std::fs::File;
use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use super::error::Result;
use super::template::{FieldKind, FieldSpec, Template};

/// Write a header plus `num_samples` rows that validate against `template`
///
/// Entity reference columns get fresh guid-like values, so the file is
/// meant for trying the pipeline rather than for real lineage.
pub fn write_sample(path: impl AsRef<Path>, template: &Template, num_samples: usize) -> Result<usize> {
    let path = path.as_ref();
    debug!(path = %path.display(), template = template.name, num_samples, "write_sample: called");

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);
    writer.write_record(template.field_names())?;

    for i in 0..num_samples {
        let record: Vec<String> = template
            .fields
            .iter()
            .map(|field| sample_value(template, field, i))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(path = %path.display(), template = template.name, rows = num_samples, "Wrote sample CSV");
    Ok(num_samples)
}

fn sample_value(template: &Template, field: &FieldSpec, i: usize) -> String {
    if template.entity_refs.contains(&field.name) {
        return Uuid::now_v7().to_string();
    }

    match field.kind {
        FieldKind::Enum(allowed) => allowed[i % allowed.len()].to_string(),
        FieldKind::Int => ((i + 1) * 60).to_string(),
        FieldKind::String => match field.name {
            "attribute" => "description".to_string(),
            "source_column" => format!("column_{}", i + 1),
            "target_column" => format!("target_column_{}", i + 1),
            "owner" => "data-engineering".to_string(),
            name => format!("sample {} {}", name.replace('_', " "), i + 1),
        },
    }
}
