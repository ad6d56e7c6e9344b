//! Per-sample report export
//!
//! Each processed sample is written as `<YYYYMMDD>_<sample>_PSQuants.json`:
//! a header block followed by the full analyte table.

use psq_common::time::report_date_stamp;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{AnalyteTableRow, ProcessedSample};
use crate::residue::build_full_analyte_table;

const FILE_SUFFIX: &str = "_PSQuants.json";
const UNNAMED_SAMPLE: &str = "NoSampleNum";

/// Header block of a sample report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportHeader {
    #[serde(rename = "Sample Number")]
    pub sample_number: String,
    #[serde(rename = "Sample Name")]
    pub sample_name: String,
    #[serde(rename = "Sample Date")]
    pub sample_date: String,
    #[serde(rename = "Batch Number")]
    pub batch_number: String,
    /// 0 when the readings carried none
    #[serde(rename = "Dilution Factor")]
    pub dilution_factor: f64,
    #[serde(rename = "Mass (g)")]
    pub mass_g: f64,
}

impl ReportHeader {
    pub fn from_sample(sample: &ProcessedSample) -> Self {
        Self {
            sample_number: sample.sample.clone(),
            sample_name: sample.sample_name.clone().unwrap_or_default(),
            sample_date: sample.sample_date.clone().unwrap_or_default(),
            batch_number: sample.batch_number.clone().unwrap_or_default(),
            dilution_factor: sample.dilution_factor.unwrap_or(0.0),
            mass_g: sample.mass_mg.unwrap_or(0.0) / 1000.0,
        }
    }
}

/// Complete report document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    pub header: ReportHeader,
    pub analytes: Vec<AnalyteTableRow>,
}

impl SampleReport {
    pub fn from_sample(sample: &ProcessedSample) -> Self {
        Self {
            header: ReportHeader::from_sample(sample),
            analytes: build_full_analyte_table(sample),
        }
    }
}

/// Sample key reduced to file-name-safe characters
pub fn safe_sample_name(sample: &str) -> String {
    let safe: String = sample
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        UNNAMED_SAMPLE.to_string()
    } else {
        safe
    }
}

pub fn report_file_name(sample: &str, date_stamp: &str) -> String {
    format!("{}_{}{}", date_stamp, safe_sample_name(sample), FILE_SUFFIX)
}

/// Write one sample report into `output_dir`, creating it if needed
pub fn export_sample_report(sample: &ProcessedSample, output_dir: &Path) -> WorkflowResult<PathBuf> {
    let io_error = |source| WorkflowError::Export {
        sample: sample.sample.clone(),
        source,
    };

    std::fs::create_dir_all(output_dir).map_err(io_error)?;
    let path = output_dir.join(report_file_name(&sample.sample, &report_date_stamp()));

    let document = serde_json::to_vec_pretty(&SampleReport::from_sample(sample))?;
    std::fs::write(&path, document).map_err(io_error)?;

    info!(sample = %sample.sample, path = %path.display(), "Sample report exported");
    Ok(path)
}

/// Export every sample, stopping at the first failure
pub fn export_samples_to_directory(samples: &[ProcessedSample], output_dir: &Path) -> WorkflowResult<Vec<PathBuf>> {
    samples
        .iter()
        .map(|sample| export_sample_report(sample, output_dir))
        .collect()
}
