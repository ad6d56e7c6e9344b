//! Sample metadata collection across batches
//!
//! Worksheet sample ids rarely match LIMS ids verbatim. Each record is
//! therefore filed under several normalized keys: its primary id, its custom
//! formatted id and the tail of the custom id after the last '-'
//! (`"PS-0042"` also answers to `"42"`). The first record to claim a key
//! keeps it.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LimsSettings;
use crate::error::{WorkflowError, WorkflowResult};
use crate::lims::{BatchResolver, BatchSamples, LimsClient, LimsError, ResolutionWarning, SampleRecordBuilder, WeightExtractor};
use crate::models::{normalize_sample_id_text, SampleInfo, SampleInfoMap, SampleRecord};

/// Lookup keys for one record, deduplicated, primary id first
pub fn sample_keys(record: &SampleRecord) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(3);
    let mut add = |candidate: &str| {
        let key = normalize_sample_id_text(candidate);
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    };

    add(&record.id);
    if let Some(custom_id) = record.custom_formatted_id.as_deref() {
        add(custom_id);
        if let Some((_, tail)) = custom_id.rsplit_once('-') {
            add(tail);
        }
    }
    keys
}

/// Metadata gathered for a set of batches
#[derive(Debug, Clone, Default)]
pub struct SampleInfoCollection {
    pub info: SampleInfoMap,
    /// One summary line per batch
    pub diagnostics: Vec<String>,
    pub failures: Vec<ResolutionWarning>,
    pub records_seen: usize,
}

impl SampleInfoCollection {
    /// File every record of `batch` under its keys (first claim wins)
    pub fn merge(&mut self, batch: &BatchSamples) {
        for record in &batch.records {
            let info = SampleInfo::from_record(record, &batch.batch_id);
            for key in sample_keys(record) {
                self.info.entry(key).or_insert_with(|| info.clone());
            }
        }
        self.records_seen += batch.records.len();
        self.failures.extend(batch.failures.iter().cloned());
        if !batch.diagnostic.is_empty() {
            self.diagnostics.push(batch.diagnostic.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

/// Resolve every batch in turn and collect the metadata map
///
/// A LIMS failure for a batch aborts the collection with that batch named.
pub async fn collect_sample_info(
    client: &LimsClient,
    settings: &LimsSettings,
    batches: &[String],
    cancel: &CancellationToken,
) -> WorkflowResult<SampleInfoCollection> {
    let resolver = BatchResolver::new(client, settings.page_size);
    let builder = SampleRecordBuilder::new(client, WeightExtractor::new(settings.reference_mass));
    let mut collection = SampleInfoCollection::default();

    for batch_id in batches {
        debug!(batch_id = %batch_id, "Collecting sample info");
        let batch = builder
            .fetch_batch_samples(&resolver, batch_id, cancel)
            .await
            .map_err(|source| match source {
                LimsError::Cancelled => WorkflowError::Cancelled,
                source => WorkflowError::Lims {
                    batch_id: batch_id.clone(),
                    source,
                },
            })?;
        collection.merge(&batch);
    }

    info!(
        batches = batches.len(),
        records = collection.records_seen,
        keys = collection.info.len(),
        "Sample info collected"
    );
    Ok(collection)
}
