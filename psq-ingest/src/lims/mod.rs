//! LIMS API integration
//!
//! Turns batch identifiers into fully populated sample records despite an
//! inconsistent upstream schema:
//! - [`token`]: signed short-lived credential and its expiry
//! - [`client`]: authenticated request pipeline with retry/backoff
//! - [`batch_resolver`]: batch payload → ordered, deduplicated sample ids
//! - [`sample_builder`]: sample payload → [`crate::models::SampleRecord`]
//! - [`weight`]: where-is-the-mass heuristic

pub mod batch_resolver;
pub mod client;
pub mod payload;
pub mod sample_builder;
pub mod token;
pub mod weight;

pub use batch_resolver::{extract_sample_ids, BatchResolution, BatchResolver};
pub use client::{LimsClient, LimsError, RetryPolicy};
pub use sample_builder::{BatchSamples, SampleRecordBuilder};
pub use token::{AuthError, TokenManager};
pub use weight::WeightExtractor;

use std::fmt;

/// Non-fatal resolution outcome reported next to partial results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// Blank batch identifier supplied
    EmptyBatchId,
    /// Batch payload referenced no sample ids
    NoSampleIds { batch_id: String },
    /// One sample could not be fetched
    SampleFetchFailed { sample_id: String, message: String },
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::EmptyBatchId => write!(f, "Empty batch id"),
            ResolutionWarning::NoSampleIds { batch_id } => {
                write!(f, "Batch {}: 0 samples referenced", batch_id)
            }
            ResolutionWarning::SampleFetchFailed { sample_id, message } => {
                write!(f, "{}: {}", sample_id, message)
            }
        }
    }
}
