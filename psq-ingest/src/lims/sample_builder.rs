//! Sample payload → [`SampleRecord`]

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::batch_resolver::BatchResolver;
use super::client::{LimsClient, LimsError};
use super::payload::{field_text, first_text, non_empty_object, scalar_text};
use super::weight::WeightExtractor;
use super::ResolutionWarning;
use crate::models::SampleRecord;

/// Custom-field spellings of the batch number, in lookup order
const BATCH_NUMBER_FIELDS: [&str; 5] = ["Batch", "batch", "Batch #", "Lote", "Lot"];

/// Default page size for the sample listing used by batch search
pub const DEFAULT_SEARCH_PAGE_SIZE: usize = 200;

/// Sample objects carried by a sample endpoint response
///
/// Accepts `{data: {...}}`, `{data: [...]}`, a bare object or a bare array.
pub fn sample_objects(payload: &Value) -> Vec<&Map<String, Value>> {
    match payload.get("data") {
        Some(Value::Object(sample)) => vec![sample],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => match payload {
            Value::Object(sample) => vec![sample],
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        },
    }
}

/// `custom_fields`, or `fields` when the former is absent or empty
pub fn custom_fields(sample: &Map<String, Value>) -> Option<&Map<String, Value>> {
    non_empty_object(sample, "custom_fields").or_else(|| non_empty_object(sample, "fields"))
}

/// Batch number from the direct field or a known custom-field alias
pub fn batch_number(sample: &Map<String, Value>, custom: Option<&Map<String, Value>>) -> String {
    field_text(sample, "batch_number")
        .or_else(|| custom.and_then(|c| first_text(c, &BATCH_NUMBER_FIELDS)))
        .unwrap_or_default()
}

/// Every record of one batch, with per-sample failures kept aside
#[derive(Debug, Clone, Default)]
pub struct BatchSamples {
    pub batch_id: String,
    pub records: Vec<SampleRecord>,
    /// Ids the batch referenced (after the page-size cap)
    pub requested_ids: Vec<String>,
    pub failures: Vec<ResolutionWarning>,
    /// One-line summary for operators
    pub diagnostic: String,
}

/// Builds normalized sample records from LIMS sample resources
pub struct SampleRecordBuilder<'a> {
    client: &'a LimsClient,
    weights: WeightExtractor,
}

impl<'a> SampleRecordBuilder<'a> {
    pub fn new(client: &'a LimsClient, weights: WeightExtractor) -> Self {
        Self { client, weights }
    }

    /// Normalize one raw sample object
    ///
    /// `fallback_id` is used when the object carries no usable `id`.
    pub fn build_record(&self, sample: &Map<String, Value>, fallback_id: &str) -> SampleRecord {
        let custom = custom_fields(sample);

        SampleRecord {
            id: sample
                .get("id")
                .and_then(scalar_text)
                .unwrap_or_else(|| fallback_id.to_string()),
            custom_formatted_id: field_text(sample, "custom_formatted_id"),
            sample_name: field_text(sample, "sample_name"),
            matrix_type: field_text(sample, "matrix_type"),
            state: field_text(sample, "state"),
            date_created: field_text(sample, "date_created"),
            batch_number: batch_number(sample, custom),
            sample_weight: self.weights.extract(sample, custom),
            raw: Value::Object(sample.clone()),
        }
    }

    /// Fetch `sample/{id}` and build every sample object it carries
    pub async fn fetch_sample(&self, sample_id: &str) -> Result<Vec<SampleRecord>, LimsError> {
        let payload = self.client.get_json(&format!("sample/{}", sample_id), None).await?;
        let records: Vec<SampleRecord> = sample_objects(&payload)
            .into_iter()
            .map(|sample| self.build_record(sample, sample_id))
            .collect();

        debug!(sample_id = %sample_id, records = records.len(), "Fetched sample");
        Ok(records)
    }

    /// Resolve a batch and fetch each of its samples in turn
    ///
    /// A failing sample is recorded in `failures` and skipped. Errors
    /// fetching the batch itself, and cancellation, abort the call.
    pub async fn fetch_batch_samples(
        &self,
        resolver: &BatchResolver<'_>,
        batch_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchSamples, LimsError> {
        if cancel.is_cancelled() {
            return Err(LimsError::Cancelled);
        }

        let resolution = resolver.resolve(batch_id).await?;
        if let Some(warning) = resolution.warning {
            warn!(batch_id = %batch_id, "{}", warning);
            return Ok(BatchSamples {
                batch_id: resolution.batch_id,
                diagnostic: warning.to_string(),
                ..Default::default()
            });
        }

        let mut records = Vec::new();
        let mut failures = Vec::new();

        for sample_id in &resolution.sample_ids {
            if cancel.is_cancelled() {
                return Err(LimsError::Cancelled);
            }
            match self.fetch_sample(sample_id).await {
                Ok(mut fetched) => records.append(&mut fetched),
                Err(e) => {
                    warn!(batch_id = %batch_id, sample_id = %sample_id, error = %e, "Sample fetch failed");
                    failures.push(ResolutionWarning::SampleFetchFailed {
                        sample_id: sample_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut diagnostic = format!(
            "Batch {}: {} samples fetched | ids={}",
            resolution.batch_id,
            records.len(),
            resolution.sample_ids.len()
        );
        if !failures.is_empty() {
            diagnostic.push_str(&format!(" | failed={}", failures.len()));
        }

        info!(
            batch_id = %resolution.batch_id,
            fetched = records.len(),
            failed = failures.len(),
            "Batch samples fetched"
        );

        Ok(BatchSamples {
            batch_id: resolution.batch_id,
            records,
            requested_ids: resolution.sample_ids,
            failures,
            diagnostic,
        })
    }

    /// Newest samples whose batch number, custom id or name contains `batch_number`
    ///
    /// The LIMS listing has no reliable batch filter, so matching happens
    /// client-side over the first page.
    pub async fn search_samples_by_batch(
        &self,
        batch_number: &str,
        page_size: usize,
    ) -> Result<(Vec<SampleRecord>, String), LimsError> {
        let page_size = page_size.to_string();
        let params = [
            ("page_size", page_size.as_str()),
            ("page_num", "1"),
            ("sort_by", "date_created"),
            ("sort_order", "desc"),
        ];
        let payload = self.client.get_json("sample", Some(&params[..])).await?;

        let records: Vec<SampleRecord> = sample_objects(&payload)
            .into_iter()
            .map(|sample| self.build_record(sample, ""))
            .collect();
        let listed = records.len();

        let needle = batch_number.trim();
        let matches: Vec<SampleRecord> = records
            .into_iter()
            .filter(|record| !needle.is_empty() && matches_batch(record, needle))
            .collect();

        let diagnostic = format!("GET sample → {} items | matches={}", listed, matches.len());
        debug!(batch_number = %needle, listed, matches = matches.len(), "Sample search");
        Ok((matches, diagnostic))
    }
}

fn matches_batch(record: &SampleRecord, needle: &str) -> bool {
    let haystack = [
        record.batch_number.as_str(),
        record.custom_formatted_id.as_deref().unwrap_or_default(),
        record.sample_name.as_deref().unwrap_or_default(),
    ]
    .join(" ");
    haystack.contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimsSettings;
    use serde_json::json;

    fn client() -> LimsClient {
        LimsClient::new(&LimsSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            jwt_leeway_s: 20,
            jwt_ttl_s: 3580,
            page_size: None,
            reference_mass: 500.0,
        })
        .unwrap()
    }

    #[test]
    fn test_sample_objects_shapes() {
        let single = json!({"data": {"id": 1}});
        assert_eq!(sample_objects(&single).len(), 1);

        let list = json!({"data": [{"id": 1}, {"id": 2}, "junk"]});
        assert_eq!(sample_objects(&list).len(), 2);

        let bare = json!({"id": 3, "data": null});
        assert_eq!(sample_objects(&bare)[0]["id"], 3);

        let array = json!([{"id": 4}, {"id": 5}]);
        assert_eq!(sample_objects(&array).len(), 2);

        assert!(sample_objects(&json!("nope")).is_empty());
    }

    #[test]
    fn test_batch_number_lookup_order() {
        let sample = json!({"batch_number": "B-1", "custom_fields": {"Batch": "B-2"}});
        let sample = sample.as_object().unwrap();
        assert_eq!(batch_number(sample, custom_fields(sample)), "B-1");

        let sample = json!({"custom_fields": {"Lot": "L-9", "Lote": "L-8"}});
        let sample = sample.as_object().unwrap();
        assert_eq!(batch_number(sample, custom_fields(sample)), "L-8");

        let sample = json!({"custom_fields": {}, "fields": {"Batch #": 77}});
        let sample = sample.as_object().unwrap();
        assert_eq!(batch_number(sample, custom_fields(sample)), "77");

        let sample = json!({"custom_fields": {"batch number": "x"}});
        let sample = sample.as_object().unwrap();
        assert_eq!(batch_number(sample, custom_fields(sample)), "");
    }

    #[test]
    fn test_build_record() {
        let client = client();
        let builder = SampleRecordBuilder::new(&client, WeightExtractor::default());
        let sample = json!({
            "id": 42.0,
            "custom_formatted_id": "PS-0042",
            "sample_name": "Blue Dream",
            "matrix_type": "Flower",
            "state": "COMPLETED",
            "date_created": "2024-03-01T10:00:00Z",
            "custom_fields": {"Batch": "B-7", "Sample Weight": "505 mg"},
        });

        let record = builder.build_record(sample.as_object().unwrap(), "fallback");
        assert_eq!(record.id, "42");
        assert_eq!(record.custom_formatted_id.as_deref(), Some("PS-0042"));
        assert_eq!(record.batch_number, "B-7");
        assert_eq!(record.sample_weight, "505");
        assert_eq!(record.raw["sample_name"], "Blue Dream");

        let record = builder.build_record(json!({"sample_name": "x"}).as_object().unwrap(), "17");
        assert_eq!(record.id, "17");
        assert_eq!(record.batch_number, "");
        assert_eq!(record.sample_weight, "");
    }

    #[test]
    fn test_matches_batch_over_known_fields() {
        let client = client();
        let builder = SampleRecordBuilder::new(&client, WeightExtractor::default());
        let record = builder.build_record(
            json!({"id": 1, "custom_formatted_id": "PS-2024-11", "sample_name": "Kush"})
                .as_object()
                .unwrap(),
            "",
        );
        assert!(matches_batch(&record, "2024-11"));
        assert!(matches_batch(&record, "Kush"));
        assert!(!matches_batch(&record, "B-9"));
    }
}
