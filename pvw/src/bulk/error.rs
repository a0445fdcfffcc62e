//! Configuration-class errors for the bulk pipeline
//!
//! Row problems are not errors here: they are reported as data in
//! `ValidationResult` and `BatchOutcome`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("Unknown template '{name}' (available: {})", available.join(", "))]
    UnknownTemplate { name: String, available: Vec<String> },

    #[error("File not found or unreadable: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing header row in {source_name}")]
    MissingHeader { source_name: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BulkError>;
