//! LIMS sample records and the metadata map joined with raw readings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized sample as returned by the Sample Record Builder
///
/// Immutable after construction. `raw` keeps the upstream payload for
/// diagnostics only and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Sample identifier; numeric ids are in integer-string form
    pub id: String,
    pub custom_formatted_id: Option<String>,
    pub sample_name: Option<String>,
    pub matrix_type: Option<String>,
    pub state: Option<String>,
    pub date_created: Option<String>,
    /// Batch number, empty when none could be found
    pub batch_number: String,
    /// Extracted mass text, empty when none could be found
    pub sample_weight: String,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// Metadata the residue engine needs for one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub sample_weight: Option<String>,
    pub sample_name: Option<String>,
    pub custom_formatted_id: Option<String>,
    pub batch_number: Option<String>,
    pub sample_date: Option<String>,
}

/// Sample metadata keyed by normalized sample id
pub type SampleInfoMap = HashMap<String, SampleInfo>;

impl SampleInfo {
    /// Project a LIMS record, falling back to `batch_id` for the batch number
    pub fn from_record(record: &SampleRecord, batch_id: &str) -> Self {
        let batch_number = if record.batch_number.is_empty() {
            batch_id.to_string()
        } else {
            record.batch_number.clone()
        };
        Self {
            sample_weight: Some(record.sample_weight.clone()).filter(|w| !w.is_empty()),
            sample_name: record.sample_name.clone(),
            custom_formatted_id: record.custom_formatted_id.clone(),
            batch_number: Some(batch_number).filter(|b| !b.is_empty()),
            sample_date: record.date_created.clone(),
        }
    }
}
