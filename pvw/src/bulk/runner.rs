//! Validate-then-process pipeline for one CSV file

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::Result;
use super::processor::{BatchProcessor, ProcessOptions};
use super::progress::ProgressSink;
use super::report::{BatchOutcome, RunSummary, summarize};
use super::retry::RetryPolicy;
use super::row::Row;
use super::template::get_template;
use super::validator::{ValidationResult, validate};
use crate::client::PurviewClient;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub process: ProcessOptions,
    /// Process the valid rows even when some rows failed validation
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub validation: ValidationResult,
    /// None when validation errors stopped the run before processing
    pub summary: Option<RunSummary>,
}

impl RunReport {
    /// True when any row failed validation or processing
    pub fn has_failures(&self) -> bool {
        !self.validation.is_valid() || self.summary.as_ref().is_some_and(RunSummary::has_failures)
    }

    /// Rows to write to an error CSV, in row order
    ///
    /// Validation rejects carry their raw cells and joined messages; failed
    /// writes carry the validated row and the write error.
    pub fn error_rows(&self) -> Vec<(&Row, String)> {
        let mut rows: Vec<(&Row, String)> = self.validation.rejections().collect();
        if let Some(summary) = &self.summary {
            rows.extend(summary.failures().map(|o| (&o.record, o.error.clone().unwrap_or_default())));
        }
        rows.sort_by_key(|(row, _)| row.number);
        rows
    }
}

/// Validate `path` against the template, then write every valid row
///
/// Without `force`, any validation error stops the run before the first
/// network call. With `force`, invalid rows are recorded as skipped with
/// their validation messages.
pub async fn run(
    path: impl AsRef<Path>,
    template_name: &str,
    options: &RunOptions,
    client: Arc<dyn PurviewClient>,
    retry: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let path = path.as_ref();
    debug!(path = %path.display(), %template_name, force = options.force, "run: called");

    let template = get_template(template_name)?;
    let validation = validate(path, template_name)?;

    if !validation.is_valid() && !options.force {
        warn!(
            errors = validation.errors.len(),
            invalid_rows = validation.invalid_row_count(),
            "Validation failed, nothing processed"
        );
        return Ok(RunReport {
            validation,
            summary: None,
        });
    }

    let rows = validation.rows.clone();
    let processor = BatchProcessor::new(client, template, retry)
        .with_progress(progress)
        .with_cancellation(cancel);
    let mut summary = processor.process(rows, &options.process).await;

    if !validation.is_valid() {
        let skipped = skipped_invalid_rows(&validation);
        info!(rows = skipped.len(), "Recording invalid rows as skipped");
        summary = merge_skipped(summary, skipped);
    }

    Ok(RunReport {
        validation,
        summary: Some(summary),
    })
}

fn skipped_invalid_rows(validation: &ValidationResult) -> Vec<BatchOutcome> {
    validation
        .rejections()
        .map(|(row, message)| BatchOutcome::skipped(row.clone(), message))
        .collect()
}

fn merge_skipped(summary: RunSummary, skipped: Vec<BatchOutcome>) -> RunSummary {
    let RunSummary {
        elapsed,
        started_at,
        warnings,
        mut outcomes,
        ..
    } = summary;
    outcomes.extend(skipped);

    let mut merged = summarize(outcomes, elapsed);
    merged.started_at = started_at;
    merged.warnings = warnings;
    merged
}
