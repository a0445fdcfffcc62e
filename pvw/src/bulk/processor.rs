//! Batch processor
//!
//! Rows are split into consecutive batches. Within a batch up to
//! `concurrency` rows are in flight at once; the next batch starts only
//! after every row of the current one has finished. Outcomes are collected
//! in row order through the single stream consumer, so no locking is needed.

use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::payload::{Payload, ResolvedRefs, build_payload, placeholder_entity};
use super::progress::{NoProgress, ProgressEvent, ProgressSink, Totals};
use super::report::{BatchOutcome, OutcomeStatus, RunSummary, summarize};
use super::retry::RetryPolicy;
use super::row::Row;
use super::template::Template;
use crate::client::{ApiError, EntityMutationResponse, PurviewClient};

/// Message recorded for rows never started because the run was cancelled
pub const CANCELLED: &str = "run cancelled";

/// Knobs for one processing run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub batch_size: usize,
    /// Rows in flight per batch; clamped to `1..=batch_size`
    pub concurrency: usize,
    /// Look up every referenced entity before writing
    pub validate_entities_exist: bool,
    /// Create placeholder entities for missing references instead of failing
    pub create_missing_entities: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::DEFAULT_BATCH_SIZE,
            concurrency: crate::DEFAULT_CONCURRENCY,
            validate_entities_exist: false,
            create_missing_entities: false,
        }
    }
}

impl ProcessOptions {
    fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, self.effective_batch_size())
    }
}

/// Why a row could not be written
struct RowFailure {
    message: String,
    http_status: Option<u16>,
    attempts: u32,
}

impl RowFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status: None,
            attempts: 0,
        }
    }

    fn from_api(context: &str, error: &ApiError, attempts: u32) -> Self {
        Self {
            message: format!("{}: {}", context, error),
            http_status: error.status(),
            attempts,
        }
    }
}

/// Turns validated rows into Purview writes
pub struct BatchProcessor {
    client: Arc<dyn PurviewClient>,
    template: &'static Template,
    retry: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl BatchProcessor {
    pub fn new(client: Arc<dyn PurviewClient>, template: &'static Template, retry: RetryPolicy) -> Self {
        debug!(template = template.name, ?retry, "BatchProcessor::new: called");
        Self {
            client,
            template,
            retry,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process all rows and summarize the run
    pub async fn process(&self, rows: Vec<Row>, options: &ProcessOptions) -> RunSummary {
        let started = Instant::now();
        let batch_size = options.effective_batch_size();
        let concurrency = options.effective_concurrency();
        let batches = rows.len().div_ceil(batch_size);
        info!(
            template = self.template.name,
            rows = rows.len(),
            batch_size,
            concurrency,
            batches,
            "Processing started"
        );

        let mut totals = Totals::new(rows.len());
        let mut outcomes = Vec::with_capacity(rows.len());
        let mut warnings = Vec::new();
        let mut remaining = rows.into_iter().peekable();
        let mut batch_index = 0;

        while remaining.peek().is_some() {
            let batch: Vec<Row> = remaining.by_ref().take(batch_size).collect();
            batch_index += 1;

            if self.cancel.is_cancelled() {
                debug!(batch = batch_index, "process: cancelled before batch");
                for row in batch.into_iter().chain(remaining.by_ref()) {
                    let outcome = BatchOutcome::skipped(row, CANCELLED);
                    self.record(&mut totals, &outcome);
                    outcomes.push(outcome);
                }
                break;
            }

            self.progress.emit(ProgressEvent::BatchStarted {
                batch: batch_index,
                batches,
                rows: batch.len(),
            });
            debug!(batch = batch_index, rows = batch.len(), "process: batch started");

            let batch_len = batch.len();
            let mut batch_failed = 0;
            let mut results = pin!(
                stream::iter(batch)
                    .map(|row| self.process_row(row, options))
                    .buffered(concurrency)
            );

            while let Some(outcome) = results.next().await {
                if outcome.status == OutcomeStatus::Failed {
                    batch_failed += 1;
                }
                self.record(&mut totals, &outcome);
                outcomes.push(outcome);
            }

            if batch_len > 0 && batch_failed == batch_len {
                let message = format!("every row in batch {} failed ({} rows)", batch_index, batch_len);
                warn!(batch = batch_index, rows = batch_len, "every row in batch failed");
                warnings.push(message);
            }
        }

        self.progress.emit(ProgressEvent::Finished { totals });

        let mut summary = summarize(outcomes, started.elapsed());
        warnings.append(&mut summary.warnings);
        summary.warnings = warnings;

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Processing finished"
        );
        summary
    }

    fn record(&self, totals: &mut Totals, outcome: &BatchOutcome) {
        totals.record(outcome.status);
        self.progress.emit(ProgressEvent::RowFinished {
            row: outcome.row,
            status: outcome.status,
            totals: *totals,
        });
    }

    async fn process_row(&self, row: Row, options: &ProcessOptions) -> BatchOutcome {
        if self.cancel.is_cancelled() {
            debug!(row = row.number, "process_row: cancelled before start");
            return BatchOutcome::skipped(row, CANCELLED);
        }
        debug!(row = row.number, "process_row: called");

        let refs = if options.validate_entities_exist {
            match self.resolve_refs(&row, options.create_missing_entities).await {
                Ok(refs) => refs,
                Err(f) => return BatchOutcome::failed(row, f.message, f.http_status, f.attempts),
            }
        } else {
            ResolvedRefs::new()
        };

        let payload = match build_payload(self.template, &row, &refs) {
            Ok(p) => p,
            Err(e) => return BatchOutcome::failed(row, e, None, 0),
        };

        let attempted = self
            .retry
            .run("dispatch", || async {
                match &payload {
                    Payload::Entity(entity) => self.client.create_or_update_entity(entity).await,
                    Payload::AttributeUpdate { guid, attribute, value } => {
                        self.client.update_entity_attribute(guid, attribute, value).await
                    }
                }
            })
            .await;

        match attempted.result {
            Ok(response) => {
                let guid = response.primary_guid().map(str::to_string);
                debug!(row = row.number, ?guid, attempts = attempted.attempts, "process_row: succeeded");
                BatchOutcome::succeeded(row, guid, attempted.attempts)
            }
            Err(e) => {
                debug!(row = row.number, error = %e, attempts = attempted.attempts, "process_row: failed");
                let status = e.status();
                BatchOutcome::failed(row, e.to_string(), status, attempted.attempts)
            }
        }
    }

    /// Look up every referenced entity, creating placeholders when allowed
    async fn resolve_refs(&self, row: &Row, create_missing: bool) -> Result<ResolvedRefs, RowFailure> {
        let mut refs = ResolvedRefs::new();

        for field in self.template.entity_refs {
            let Some(reference) = row.text(field) else {
                return Err(RowFailure::new(format!("missing value for {}", field)));
            };
            if refs.contains_key(reference) {
                continue;
            }

            let lookup = self.retry.run("lookup", || self.client.get_entity(reference)).await;
            match lookup.result {
                Ok(Some(entity)) => {
                    debug!(%reference, guid = %entity.guid, "resolve_refs: found");
                    refs.insert(reference.to_string(), entity.guid);
                }
                Ok(None) if create_missing => {
                    let guid = self.create_placeholder(reference).await?;
                    refs.insert(reference.to_string(), guid);
                }
                Ok(None) => {
                    debug!(%reference, "resolve_refs: not found");
                    return Err(RowFailure {
                        message: format!("entity not found: {}", reference),
                        http_status: Some(404),
                        attempts: lookup.attempts,
                    });
                }
                Err(e) => return Err(RowFailure::from_api(&format!("lookup of {} failed", reference), &e, lookup.attempts)),
            }
        }

        Ok(refs)
    }

    async fn create_placeholder(&self, reference: &str) -> Result<String, RowFailure> {
        info!(%reference, "Creating placeholder entity for missing reference");
        let entity = placeholder_entity(reference);
        let created = self
            .retry
            .run("create placeholder", || self.client.create_or_update_entity(&entity))
            .await;

        match created.result {
            Ok(response) => guid_from(&response).ok_or_else(|| RowFailure {
                message: format!("placeholder for {} returned no guid", reference),
                http_status: None,
                attempts: created.attempts,
            }),
            Err(e) => Err(RowFailure::from_api(
                &format!("creating placeholder for {} failed", reference),
                &e,
                created.attempts,
            )),
        }
    }
}

fn guid_from(response: &EntityMutationResponse) -> Option<String> {
    response.primary_guid().map(str::to_string)
}
