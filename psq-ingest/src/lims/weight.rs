//! Sample weight extraction
//!
//! Laboratories record sample mass in different places. Candidates are
//! gathered from four sources, best first:
//!
//! 1. pesticide-residue assay tests (completed tests preferred), including
//!    their embedded worksheet data
//! 2. a weight field directly on the sample
//! 3. known custom-field aliases
//! 4. any custom field whose key mentions weight or mass (not "trip")
//!
//! The best source with a usable value wins. Within a source, the value
//! closest to the reference mass is taken, then the earliest candidate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

use crate::config::DEFAULT_REFERENCE_MASS;
use crate::models::reading::number_text;

/// Weight aliases on pesticide test records and their worksheet data
const TEST_WEIGHT_FIELDS: [&str; 10] = [
    "sample_weight",
    "sample_mass",
    "weight",
    "mass",
    "Sample Weight",
    "Sample Mass",
    "Weight",
    "Mass",
    "Weight (mg)",
    "Mass (mg)",
];

/// Keys under which a test embeds its worksheet data
const WORKSHEET_KEYS: [&str; 3] = ["worksheet_data", "worksheet", "worksheet_json"];

/// Direct weight fields on the sample object
const SAMPLE_WEIGHT_FIELDS: [&str; 4] = ["sample_weight", "sample_mass", "weight", "mass"];

/// Known custom-field spellings (case-sensitive)
const CUSTOM_WEIGHT_FIELDS: [&str; 12] = [
    "Sample Weight",
    "Sample weight",
    "Sample Mass",
    "Sample mass",
    "Weight",
    "Weight (mg)",
    "Mass",
    "Mass (mg)",
    "Peso",
    "Peso (mg)",
    "Peso muestra",
    "Masa",
];

const ASSAY_NAME_KEYS: [&str; 5] = ["title", "name", "abbreviation", "abbrev", "code"];
const TEST_ASSAY_KEYS: [&str; 3] = ["assay_title", "assay_name", "title"];
const PESTICIDE_KEYWORD: &str = "pesticide";
const PESTICIDE_ABBREVIATIONS: [&str; 3] = ["PS", "PEST", "PESTS"];

/// Generic scan tokens, and the token that disqualifies a key
const GENERIC_WEIGHT_TOKENS: [&str; 2] = ["weight", "mass"];
const GENERIC_EXCLUDED_TOKEN: &str = "trip";

/// Leading numeric token, thousands separators allowed
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:\d[\d,]*(?:\.\d*)?|\.\d+)").expect("leading number pattern is valid")
});

/// Where a weight candidate came from; lower ranks first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WeightSource {
    PesticideTest,
    SampleField,
    CustomFieldAlias,
    CustomFieldScan,
}

/// One usable weight value
#[derive(Debug, Clone, PartialEq)]
pub struct WeightCandidate {
    pub source: WeightSource,
    /// Normalized value text
    pub value: String,
    /// Only meaningful for test candidates
    pub completed: bool,
    /// Discovery order
    pub order: usize,
}

/// Normalize a raw weight value to plain numeric text
///
/// Numbers pass through. Strings are trimmed, reduced to their leading
/// numeric token and stripped of thousands separators. Anything else, or
/// text without a leading number, yields an empty string.
pub fn normalize_weight_value(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(number_text).unwrap_or_default(),
        },
        Value::String(s) => normalize_weight_text(s),
        Value::Object(object) => object.get("value").map(normalize_weight_value).unwrap_or_default(),
        _ => String::new(),
    }
}

fn normalize_weight_text(text: &str) -> String {
    let Some(token) = LEADING_NUMBER.find(text.trim()) else {
        return String::new();
    };
    let cleaned = token.as_str().replace(',', "");
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.parse::<f64>().is_ok() {
        cleaned.to_string()
    } else {
        String::new()
    }
}

fn is_pesticide_label(label: &str) -> bool {
    let label = label.trim();
    label.to_lowercase().contains(PESTICIDE_KEYWORD)
        || PESTICIDE_ABBREVIATIONS.contains(&label.to_uppercase().as_str())
}

/// True when the test record belongs to the pesticide-residue assay
fn is_pesticide_test(test: &Map<String, Value>) -> bool {
    let assay_labels: Vec<&str> = match test.get("assay") {
        Some(Value::Object(assay)) => ASSAY_NAME_KEYS
            .iter()
            .filter_map(|k| assay.get(*k).and_then(Value::as_str))
            .collect(),
        Some(Value::String(label)) => vec![label.as_str()],
        _ => Vec::new(),
    };

    assay_labels
        .into_iter()
        .chain(TEST_ASSAY_KEYS.iter().filter_map(|k| test.get(*k).and_then(Value::as_str)))
        .any(is_pesticide_label)
}

fn is_completed(test: &Map<String, Value>) -> bool {
    ["state", "status"]
        .iter()
        .filter_map(|k| test.get(*k).and_then(Value::as_str))
        .any(|s| s.trim().to_lowercase().starts_with("complet"))
}

/// Weight heuristic with a configurable reference mass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightExtractor {
    reference_mass: f64,
}

impl Default for WeightExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_MASS)
    }
}

impl WeightExtractor {
    pub fn new(reference_mass: f64) -> Self {
        Self { reference_mass }
    }

    /// Best weight for the sample, empty when nothing usable was found
    pub fn extract(&self, sample: &Map<String, Value>, custom_fields: Option<&Map<String, Value>>) -> String {
        let candidates = self.candidates(sample, custom_fields);
        let best = candidates.iter().min_by(|a, b| self.rank(a, b));

        match best {
            Some(candidate) => {
                debug!(
                    source = ?candidate.source,
                    value = %candidate.value,
                    candidates = candidates.len(),
                    "Sample weight selected"
                );
                candidate.value.clone()
            }
            None => String::new(),
        }
    }

    /// Every usable candidate in discovery order
    pub fn candidates(
        &self,
        sample: &Map<String, Value>,
        custom_fields: Option<&Map<String, Value>>,
    ) -> Vec<WeightCandidate> {
        let mut found = Vec::new();
        let mut push = |source: WeightSource, value: &Value, completed: bool| {
            let value = normalize_weight_value(value);
            if !value.is_empty() {
                let order = found.len();
                found.push(WeightCandidate {
                    source,
                    value,
                    completed,
                    order,
                });
            }
        };

        let tests = sample.get("tests").and_then(Value::as_array);
        for test in tests.into_iter().flatten().filter_map(Value::as_object) {
            if !is_pesticide_test(test) {
                continue;
            }
            let completed = is_completed(test);
            for field in TEST_WEIGHT_FIELDS {
                if let Some(value) = test.get(field) {
                    push(WeightSource::PesticideTest, value, completed);
                }
            }
            let worksheets = WORKSHEET_KEYS.iter().filter_map(|k| test.get(*k).and_then(Value::as_object));
            for worksheet in worksheets {
                for field in TEST_WEIGHT_FIELDS {
                    if let Some(value) = worksheet.get(field) {
                        push(WeightSource::PesticideTest, value, completed);
                    }
                }
            }
        }

        for field in SAMPLE_WEIGHT_FIELDS {
            if let Some(value) = sample.get(field) {
                push(WeightSource::SampleField, value, false);
            }
        }

        if let Some(custom) = custom_fields {
            for field in CUSTOM_WEIGHT_FIELDS {
                if let Some(value) = custom.get(field) {
                    push(WeightSource::CustomFieldAlias, value, false);
                }
            }
            for (key, value) in custom {
                let lowered = key.to_lowercase();
                let mentions_weight = GENERIC_WEIGHT_TOKENS.iter().any(|t| lowered.contains(t));
                if mentions_weight && !lowered.contains(GENERIC_EXCLUDED_TOKEN) {
                    push(WeightSource::CustomFieldScan, value, false);
                }
            }
        }

        found
    }

    fn distance(&self, candidate: &WeightCandidate) -> f64 {
        candidate
            .value
            .parse::<f64>()
            .map(|v| (v - self.reference_mass).abs())
            .unwrap_or(f64::INFINITY)
    }

    /// Source, then completed tests, then closeness to the reference, then order
    fn rank(&self, a: &WeightCandidate, b: &WeightCandidate) -> Ordering {
        a.source
            .cmp(&b.source)
            .then_with(|| b.completed.cmp(&a.completed))
            .then_with(|| self.distance(a).total_cmp(&self.distance(b)))
            .then_with(|| a.order.cmp(&b.order))
    }
}
