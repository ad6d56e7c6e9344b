//! Error types for psq-ingest
//!
//! Fatal conditions are a small closed set of error kinds:
//! - [`crate::lims::AuthError`]: credential acquisition failed
//! - [`crate::lims::LimsError`]: transport/HTTP failure after retries
//! - [`ValidationError`]: the inputs cannot be computed at all
//!
//! Degraded-but-complete computation is never an error. The residue engine
//! reports it in-band with sentinel values ("Invalid Mass", "Error", "-"),
//! and per-sample fetch failures are counted in diagnostics.

use std::path::PathBuf;
use thiserror::Error;

use crate::lims::LimsError;

/// Input validation failures that abort a run before computation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// No batch identifiers were supplied
    #[error("No batches were provided for processing")]
    NoBatches,

    /// Workbook path does not exist
    #[error("Workbook not found: {}", .0.display())]
    WorkbookNotFound(PathBuf),

    /// Workbook could not be opened or decoded
    #[error("Workbook {} could not be read: {reason}", .path.display())]
    WorkbookUnreadable { path: PathBuf, reason: String },

    /// Expected worksheet is missing from the workbook
    #[error("Worksheet '{0}' not found in workbook")]
    WorksheetNotFound(String),

    /// Worksheet has no rows
    #[error("Worksheet '{0}' is empty or could not be read")]
    EmptyWorksheet(String),

    /// Worksheet has fewer than the six positional columns
    #[error("Worksheet must contain at least {required} columns (A..F), found {found}")]
    InsufficientColumns { required: usize, found: usize },

    /// None of the rows carry a truthy include flag
    #[error("The worksheet contains no rows marked for inclusion")]
    NoIncludedRows,

    /// Every included sample was filtered out
    #[error("No results could be produced from the provided readings")]
    NoSamplesProduced,

    /// The LIMS returned no sample metadata for the requested batches
    #[error("LIMS returned no samples for batches: {0}")]
    NoSampleMetadata(String),
}

/// Errors surfaced by the batch-processing workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// LIMS access failed while resolving a batch
    #[error("Batch {batch_id}: {source}")]
    Lims {
        batch_id: String,
        #[source]
        source: LimsError,
    },

    /// Input validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Report export failed
    #[error("Export failed for sample {sample}: {source}")]
    Export {
        sample: String,
        #[source]
        source: std::io::Error,
    },

    /// Report serialization failed
    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The run was cancelled cooperatively
    #[error("Workflow cancelled")]
    Cancelled,
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
