//! Progress reporting for batch runs
//!
//! Sinks are fire-and-forget: emitting never waits on the consumer.

use colored::*;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::report::OutcomeStatus;

/// Running totals at the time of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Totals {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, status: OutcomeStatus) {
        self.completed += 1;
        match status {
            OutcomeStatus::Succeeded => self.succeeded += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Events emitted while a run progresses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    BatchStarted { batch: usize, batches: usize, rows: usize },
    RowFinished { row: usize, status: OutcomeStatus, totals: Totals },
    Finished { totals: Totals },
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Prints one line per event to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { batch, batches, rows } => {
                eprintln!("{} batch {}/{} ({} rows)", "»".cyan(), batch, batches, rows);
            }
            ProgressEvent::RowFinished { row, status, totals } => {
                let mark = match status {
                    OutcomeStatus::Succeeded => "✓".green(),
                    OutcomeStatus::Failed => "✗".red(),
                    OutcomeStatus::Skipped => "-".yellow(),
                };
                eprintln!(
                    "  {} row {} [{}/{}] ok={} failed={} skipped={}",
                    mark,
                    row,
                    totals.completed,
                    totals.total,
                    totals.succeeded,
                    totals.failed,
                    totals.skipped
                );
            }
            ProgressEvent::Finished { totals } => {
                eprintln!("{} {} of {} rows processed", "»".cyan(), totals.completed, totals.total);
            }
        }
    }
}

/// Forwards events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        debug!("ChannelProgress::new: called");
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is listening
        let _ = self.tx.send(event);
    }
}
