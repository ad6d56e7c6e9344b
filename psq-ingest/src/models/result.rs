//! Classified residue results

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reported value for one analyte
///
/// Non-numeric outcomes are first-class values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalResult {
    /// Below the limit of quantitation, or a zero reading ("ND")
    NotDetected,
    /// Sample mass missing, non-numeric or not positive ("Invalid Mass")
    InvalidMass,
    /// Reading had no usable amount ("0")
    NoAmount,
    /// Formatted concentration (three significant figures)
    Value(String),
}

impl FinalResult {
    pub fn as_str(&self) -> &str {
        match self {
            FinalResult::NotDetected => "ND",
            FinalResult::InvalidMass => "Invalid Mass",
            FinalResult::NoAmount => "0",
            FinalResult::Value(v) => v,
        }
    }

    /// Inverse of [`FinalResult::as_str`]
    pub fn from_text(text: &str) -> Self {
        match text {
            "ND" => FinalResult::NotDetected,
            "Invalid Mass" => FinalResult::InvalidMass,
            "0" => FinalResult::NoAmount,
            other => FinalResult::Value(other.to_string()),
        }
    }
}

impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for FinalResult {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for FinalResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinalResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(FinalResult::from_text(&text))
    }
}

/// Regulatory classification of a final result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pass,
    Fail,
    /// Final result text could not be read as a number
    Error,
    /// Not classifiable (degraded result or no registered limit)
    #[serde(rename = "-")]
    NotApplicable,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "Pass",
            Status::Fail => "Fail",
            Status::Error => "Error",
            Status::NotApplicable => "-",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result for one (sample, analyte) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteResult {
    /// Canonical analyte name
    pub analyte: String,
    /// Component label exactly as reported
    pub component: String,
    /// Raw concentration (0.0 when unusable)
    pub calc_conc: f64,
    pub final_result: FinalResult,
    pub status: Status,
    /// Dilution recommendation: "-" or an integer factor
    pub dil: String,
}

/// All results for one sample key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    pub sample: String,
    pub batch_number: Option<String>,
    pub sample_name: Option<String>,
    pub custom_formatted_id: Option<String>,
    pub sample_date: Option<String>,
    pub dilution_factor: Option<f64>,
    pub mass_mg: Option<f64>,
    /// At most one entry per canonical analyte, in first-seen order
    pub results: Vec<AnalyteResult>,
}

/// Flat projection used by presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub sample: String,
    pub component: String,
    pub status: Status,
    pub dil: String,
}

/// Engine output for a whole worksheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProcessOutput {
    pub samples: Vec<ProcessedSample>,
    pub display_rows: Vec<DisplayRow>,
}

/// Report table row (`Analyte Name, Analyte Amount, LOQ, State Limit,
/// Final Result, Status`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyteTableRow {
    #[serde(rename = "Analyte Name")]
    pub analyte_name: String,
    #[serde(rename = "Analyte Amount")]
    pub analyte_amount: f64,
    #[serde(rename = "LOQ")]
    pub loq: f64,
    /// `None` renders as "N/A"
    #[serde(rename = "State Limit", serialize_with = "serialize_limit")]
    pub state_limit: Option<f64>,
    #[serde(rename = "Final Result")]
    pub final_result: FinalResult,
    #[serde(rename = "Status")]
    pub status: Status,
}

fn serialize_limit<S: Serializer>(limit: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match limit {
        Some(value) => serializer.serialize_f64(*value),
        None => serializer.serialize_str("N/A"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_result_text_mapping() {
        assert_eq!(FinalResult::NotDetected, "ND");
        assert_eq!(FinalResult::InvalidMass.to_string(), "Invalid Mass");
        assert_eq!(FinalResult::NoAmount.as_str(), "0");
        assert_eq!(FinalResult::from_text("0.123"), FinalResult::Value("0.123".to_string()));
        assert_eq!(FinalResult::from_text("ND"), FinalResult::NotDetected);
    }

    #[test]
    fn test_status_serializes_as_report_text() {
        assert_eq!(serde_json::to_string(&Status::NotApplicable).unwrap(), "\"-\"");
        assert_eq!(serde_json::to_string(&Status::Fail).unwrap(), "\"Fail\"");
        let parsed: Status = serde_json::from_str("\"-\"").unwrap();
        assert_eq!(parsed, Status::NotApplicable);
    }

    #[test]
    fn test_table_row_uses_report_headers() {
        let row = AnalyteTableRow {
            analyte_name: "Spinosad*".to_string(),
            analyte_amount: 0.0,
            loq: 0.1,
            state_limit: None,
            final_result: FinalResult::NotDetected,
            status: Status::Pass,
        };
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["Analyte Name"], "Spinosad*");
        assert_eq!(json["State Limit"], "N/A");
        assert_eq!(json["Final Result"], "ND");
        assert_eq!(json["Status"], "Pass");
    }
}
