//! pvw - Purview bulk lineage loader
//!
//! Loads lineage and attribute updates into Microsoft Purview from CSV files.
//! Every file is validated against a named template before anything is sent;
//! valid rows are then written in batches with bounded concurrency, retry on
//! throttling, and a per-row outcome report.
//!
//! # Modules
//!
//! - [`bulk`] - Templates, validation, batch processing, and reporting
//! - [`client`] - Purview client trait and HTTP implementation
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod bulk;
pub mod cli;
pub mod client;
pub mod config;

/// Rows per batch when neither the CLI nor config says otherwise
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Rows in flight per batch when neither the CLI nor config says otherwise
pub const DEFAULT_CONCURRENCY: usize = 4;

pub use bulk::{
    BatchOutcome, BatchProcessor, BulkError, OutcomeStatus, ProcessOptions, RetryPolicy, RunOptions, RunReport,
    RunSummary, Template, ValidationError, ValidationResult,
};
pub use client::{ApiError, PurviewClient, PurviewHttpClient, create_client};
pub use config::Config;
