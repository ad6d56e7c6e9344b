//! psq-ingest library interface
//!
//! Resolves LIMS batches to sample metadata, joins it with raw instrument
//! readings and computes the pesticide residue report.
//!
//! Exposes public APIs for the binary and for integration testing.

pub mod config;
pub mod error;
pub mod lims;
pub mod models;
pub mod residue;
pub mod services;
pub mod workflow;

pub use crate::error::{ValidationError, WorkflowError, WorkflowResult};
pub use crate::lims::{AuthError, LimsClient, LimsError};
pub use crate::workflow::{BatchProcessWorkflow, WorkflowEvent, WorkflowOutcome};
