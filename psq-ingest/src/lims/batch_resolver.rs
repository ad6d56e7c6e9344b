//! Batch → sample id resolution
//!
//! Batch payloads reference their samples in several historical shapes.
//! Each shape has a recognizer; all recognizers run in a fixed order over
//! the same payload and feed one collector that keeps first-seen order and
//! drops duplicates.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info};

use super::client::{LimsClient, LimsError};
use super::payload::scalar_text;
use super::ResolutionWarning;

/// Keys holding plain scalar id lists
const SCALAR_LIST_KEYS: [&str; 2] = ["sample_ids", "sample_ids_ordered"];
/// Keys holding lists of scalars or sample objects
const SAMPLE_LIST_KEYS: [&str; 3] = ["samples", "sample_records", "sample_list"];
/// Id keys tried on sample objects; the first key present wins
const SAMPLE_OBJECT_ID_KEYS: [&str; 3] = ["id", "sample_id", "sample"];
const RELATIONSHIP_KEYS: [&str; 2] = ["samples", "sample"];
const INCLUDED_SAMPLE_TYPES: [&str; 2] = ["sample", "samples"];

type Recognizer = fn(&Map<String, Value>, &mut IdCollector);

/// Recognizers in application order
const RECOGNIZERS: [(&str, Recognizer); 4] = [
    ("scalar id lists", scalar_id_lists),
    ("sample lists", sample_lists),
    ("relationships", relationships),
    ("included", included_samples),
];

/// Ordered, deduplicating id sink
#[derive(Debug, Default)]
struct IdCollector {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl IdCollector {
    fn add(&mut self, candidate: Option<&Value>) {
        let Some(id) = candidate.and_then(scalar_text) else {
            return;
        };
        if self.seen.insert(id.clone()) {
            self.ids.push(id);
        }
    }
}

fn scalar_id_lists(payload: &Map<String, Value>, ids: &mut IdCollector) {
    for key in SCALAR_LIST_KEYS {
        if let Some(Value::Array(items)) = payload.get(key) {
            items.iter().for_each(|item| ids.add(Some(item)));
        }
    }
}

fn sample_lists(payload: &Map<String, Value>, ids: &mut IdCollector) {
    for key in SAMPLE_LIST_KEYS {
        let Some(Value::Array(items)) = payload.get(key) else {
            continue;
        };
        for item in items {
            match item {
                Value::String(_) | Value::Number(_) => ids.add(Some(item)),
                Value::Object(object) => {
                    let id_key = SAMPLE_OBJECT_ID_KEYS.iter().find(|k| object.contains_key(**k));
                    if let Some(id_key) = id_key {
                        ids.add(object.get(*id_key));
                    }
                }
                _ => {}
            }
        }
    }
}

fn relationships(payload: &Map<String, Value>, ids: &mut IdCollector) {
    let Some(Value::Object(relationships)) = payload.get("relationships") else {
        return;
    };
    let related = RELATIONSHIP_KEYS
        .iter()
        .filter_map(|key| relationships.get(*key))
        .find(|v| !is_empty_value(v));

    if let Some(Value::Array(entries)) = related.and_then(|r| r.get("data")) {
        for entry in entries {
            ids.add(entry.get("id"));
        }
    }
}

fn included_samples(payload: &Map<String, Value>, ids: &mut IdCollector) {
    let Some(Value::Array(entries)) = payload.get("included") else {
        return;
    };
    for entry in entries {
        let is_sample = entry
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| INCLUDED_SAMPLE_TYPES.contains(&t));
        if is_sample {
            ids.add(entry.get("id"));
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// All sample ids referenced by a batch payload, first-seen order
///
/// A `data` object wraps the batch in some API versions and is unwrapped
/// first. Non-object payloads reference nothing.
pub fn extract_sample_ids(payload: &Value) -> Vec<String> {
    let Value::Object(outer) = payload else {
        return Vec::new();
    };
    let batch = match outer.get("data") {
        Some(Value::Object(inner)) => inner,
        _ => outer,
    };

    let mut ids = IdCollector::default();
    for (name, recognizer) in RECOGNIZERS {
        let before = ids.ids.len();
        recognizer(batch, &mut ids);
        if ids.ids.len() > before {
            debug!(recognizer = name, found = ids.ids.len() - before, "Batch sample ids recognized");
        }
    }
    ids.ids
}

/// Sample ids for one batch, plus why the list is empty when it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResolution {
    pub batch_id: String,
    pub sample_ids: Vec<String>,
    pub warning: Option<ResolutionWarning>,
}

/// Resolves batch identifiers through the LIMS batch endpoint
pub struct BatchResolver<'a> {
    client: &'a LimsClient,
    page_size: Option<usize>,
}

impl<'a> BatchResolver<'a> {
    /// `page_size` keeps only the first N ids (no cap when `None`)
    pub fn new(client: &'a LimsClient, page_size: Option<usize>) -> Self {
        Self { client, page_size }
    }

    /// Fetch `batch/{id}?include=samples` and extract its sample ids
    ///
    /// A blank id or a batch without samples is not an error; the returned
    /// resolution carries an empty list and a warning instead.
    pub async fn resolve(&self, batch_id: &str) -> Result<BatchResolution, LimsError> {
        let batch_id = batch_id.trim();
        if batch_id.is_empty() {
            return Ok(BatchResolution {
                batch_id: String::new(),
                sample_ids: Vec::new(),
                warning: Some(ResolutionWarning::EmptyBatchId),
            });
        }

        let payload = self
            .client
            .get_json(&format!("batch/{}", batch_id), Some(&[("include", "samples")][..]))
            .await?;

        let mut sample_ids = extract_sample_ids(&payload);
        if let Some(limit) = self.page_size {
            sample_ids.truncate(limit);
        }

        let warning = sample_ids.is_empty().then(|| ResolutionWarning::NoSampleIds {
            batch_id: batch_id.to_string(),
        });

        info!(batch_id = %batch_id, samples = sample_ids.len(), "Resolved batch");

        Ok(BatchResolution {
            batch_id: batch_id.to_string(),
            sample_ids,
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_sample_ids_from_every_shape() {
        let payload = json!({
            "data": {
                "sample_ids": [1, "002", 3],
                "samples": [{"id": 3}, {"sample_id": "005"}, 6],
                "relationships": {
                    "samples": {"data": [{"id": "007"}, {"id": 6}]}
                },
                "included": [
                    {"type": "sample", "id": "008"},
                    {"type": "test", "id": "999"},
                    {"type": "samples", "id": 9.0}
                ],
            }
        });

        let ids = extract_sample_ids(&payload);
        assert_eq!(ids, vec!["1", "002", "3", "005", "6", "007", "008", "9"]);
    }

    #[test]
    fn test_extract_sample_ids_upstream_fixture() {
        let payload = json!({
            "data": {
                "sample_ids": [1, "002", 3],
                "samples": [{"id": "005"}, {"sample_id": 6}],
                "relationships": {"samples": {"data": [{"id": "007"}]}},
                "included": [{"type": "sample", "id": "008"}, {"type": "samples", "id": "009"}],
            }
        });

        assert_eq!(
            extract_sample_ids(&payload),
            vec!["1", "002", "3", "005", "6", "007", "008", "009"]
        );
    }

    #[test]
    fn test_first_present_id_key_wins() {
        // "id" present but null: no fallback to sample_id
        let payload = json!({"samples": [{"id": null, "sample_id": 5}, {"sample": 7}]});
        assert_eq!(extract_sample_ids(&payload), vec!["7"]);
    }

    #[test]
    fn test_relationship_singular_fallback() {
        let payload = json!({
            "relationships": {"samples": {}, "sample": {"data": [{"id": 11}]}}
        });
        assert_eq!(extract_sample_ids(&payload), vec!["11"]);
    }

    #[test]
    fn test_unrecognized_payloads_yield_nothing() {
        assert!(extract_sample_ids(&json!([1, 2, 3])).is_empty());
        assert!(extract_sample_ids(&json!(null)).is_empty());
        assert!(extract_sample_ids(&json!({"data": {"name": "B-1"}})).is_empty());
        assert!(extract_sample_ids(&json!({"samples": [null, true, "", [1]]})).is_empty());
    }

    #[test]
    fn test_integer_valued_floats_lose_fraction() {
        let payload = json!({"sample_ids": [12.0, 12, "12"]});
        assert_eq!(extract_sample_ids(&payload), vec!["12"]);
    }
}
