//! Bulk CSV pipeline
//!
//! Validation is local and exhaustive; processing turns valid rows into
//! Purview writes in bounded-concurrency batches with retry; reporting
//! summarizes the run and writes failed rows back out as CSV.

mod error;
mod payload;
mod processor;
mod progress;
mod report;
mod retry;
mod row;
mod runner;
mod sample;
mod template;
mod validator;

pub use error::{BulkError, Result};
pub use payload::{Payload, ResolvedRefs, build_payload, placeholder_entity};
pub use processor::{BatchProcessor, CANCELLED, ProcessOptions};
pub use progress::{ChannelProgress, ConsoleProgress, NoProgress, ProgressEvent, ProgressSink, Totals};
pub use report::{BatchOutcome, ERROR_COLUMN, OutcomeStatus, RunSummary, summarize, write_error_rows};
pub use retry::{Attempted, RetryPolicy};
pub use row::{FieldError, FieldValue, Row};
pub use runner::{RunOptions, RunReport, run};
pub use sample::write_sample;
pub use template::{
    BASIC, COLUMN_MAPPING, ENTITY_UPDATE, ETL, FieldKind, FieldSpec, LINEAGE_TYPES, PROCESS_TYPES, PayloadKind,
    Template, get_template, list_templates, templates,
};
pub use validator::{ValidationError, ValidationResult, validate, validate_reader};
