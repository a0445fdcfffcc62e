//! Run outcomes, summaries, and the re-submittable error CSV

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::Result;
use super::row::Row;
use super::template::Template;

/// Name of the trailing column added to error CSVs
pub const ERROR_COLUMN: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub row: usize,
    pub status: OutcomeStatus,
    pub error: Option<String>,
    /// Guid of the written entity
    pub guid: Option<String>,
    pub http_status: Option<u16>,
    /// Attempts spent on the final write
    pub attempts: u32,
    #[serde(skip)]
    pub record: Row,
}

impl BatchOutcome {
    pub fn succeeded(record: Row, guid: Option<String>, attempts: u32) -> Self {
        Self {
            row: record.number,
            status: OutcomeStatus::Succeeded,
            error: None,
            guid,
            http_status: None,
            attempts,
            record,
        }
    }

    pub fn failed(record: Row, error: impl Into<String>, http_status: Option<u16>, attempts: u32) -> Self {
        Self {
            row: record.number,
            status: OutcomeStatus::Failed,
            error: Some(error.into()),
            guid: None,
            http_status,
            attempts,
            record,
        }
    }

    pub fn skipped(record: Row, reason: impl Into<String>) -> Self {
        Self {
            row: record.number,
            status: OutcomeStatus::Skipped,
            error: Some(reason.into()),
            guid: None,
            http_status: None,
            attempts: 0,
            record,
        }
    }
}

/// Terminal artifact of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub warnings: Vec<String>,
    /// Row order
    pub outcomes: Vec<BatchOutcome>,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| o.status == OutcomeStatus::Failed)
    }
}

/// Aggregate outcomes into a summary
///
/// Outcomes are sorted by row number. Authentication rejections (HTTP 401 or
/// 403) are surfaced as a warning since every later row will hit them too.
pub fn summarize(mut outcomes: Vec<BatchOutcome>, elapsed: Duration) -> RunSummary {
    debug!(count = outcomes.len(), "summarize: called");
    outcomes.sort_by_key(|o| o.row);

    let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
    let succeeded = count(OutcomeStatus::Succeeded);
    let failed = count(OutcomeStatus::Failed);
    let skipped = count(OutcomeStatus::Skipped);

    let mut warnings = Vec::new();
    let auth_failures = outcomes
        .iter()
        .filter(|o| matches!(o.http_status, Some(401) | Some(403)))
        .count();
    if auth_failures > 0 {
        warn!(rows = auth_failures, "Purview rejected the credentials");
        warnings.push(format!(
            "{} row(s) rejected by authentication (HTTP 401/403); check the Purview token",
            auth_failures
        ));
    }

    let started_at = Utc::now() - chrono::Duration::from_std(elapsed).unwrap_or_default();

    RunSummary {
        succeeded,
        failed,
        skipped,
        elapsed,
        started_at,
        warnings,
        outcomes,
    }
}

/// Write `(row, message)` pairs in the template's column layout plus an
/// `error` column
///
/// Returns the number of rows written. The file validates against the same
/// template; the `error` column is ignored there. The file is always
/// created, so a run with nothing to report leaves a header-only file
/// rather than an older one.
pub fn write_error_rows<'a, I, S>(template: &Template, rows: I, path: impl AsRef<Path>) -> Result<usize>
where
    I: IntoIterator<Item = (&'a Row, S)>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    debug!(path = %path.display(), template = template.name, "write_error_rows: called");

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);

    let mut header: Vec<&str> = template.field_names().collect();
    header.push(ERROR_COLUMN);
    writer.write_record(&header)?;

    let mut written = 0;
    for (row, message) in rows {
        let mut record = row.to_record(template);
        record.push(message.as_ref().to_string());
        writer.write_record(&record)?;
        written += 1;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = written, "Wrote error CSV");
    Ok(written)
}
