//! Per-sample residue computation
//!
//! Never fails on individual values: every ambiguous numeric condition
//! degrades to a sentinel ("ND", "Invalid Mass", "0", "-", "Error"). Only an
//! input with no usable rows at all is rejected.

use std::collections::HashSet;
use tracing::{debug, info};

use super::format::format_sigfigs;
use super::limits::{is_registered, state_limit, LOQ};
use crate::error::ValidationError;
use crate::models::{
    AnalyteResult, BatchProcessOutput, DisplayRow, FinalResult, ProcessedSample, RawReadingRow,
    SampleInfoMap, Status,
};

/// Raw concentration above which a re-run at higher dilution is advised
const DILUTION_THRESHOLD: f64 = 200.0;

/// Significant figures in reported results
const RESULT_SIG_FIGS: u32 = 3;

/// Map an instrument component label to its canonical analyte name
///
/// A trailing ordinal suffix (space + digits, e.g. "Bifenthrin 1") is
/// dropped, unless the full label is itself a registered analyte
/// ("MGK 264").
pub fn canonical_analyte(component: &str) -> String {
    let label = component.trim();
    if is_registered(label) {
        return label.to_string();
    }
    match label.rsplit_once(' ') {
        Some((head, tail))
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) && !head.trim().is_empty() =>
        {
            head.trim_end().to_string()
        }
        _ => label.to_string(),
    }
}

/// Mass-adjusted, LOQ-filtered final result for one reading
pub fn compute_final_result(amount: Option<f64>, mass_mg: Option<f64>, dilution_factor: Option<f64>) -> FinalResult {
    let amount = match amount {
        Some(a) if !a.is_nan() => a,
        _ => return FinalResult::NoAmount,
    };
    if amount == 0.0 {
        return FinalResult::NotDetected;
    }
    let mass = match mass_mg {
        Some(m) if !m.is_nan() && m > 0.0 => m,
        _ => return FinalResult::InvalidMass,
    };
    let dilution = dilution_factor.filter(|d| !d.is_nan()).unwrap_or(0.0);

    let result = (amount / mass) * dilution;
    if result < LOQ {
        return FinalResult::NotDetected;
    }
    FinalResult::Value(format_sigfigs(result, RESULT_SIG_FIGS))
}

/// Classify a final result against the analyte's state limit
pub fn status_from_final(analyte: &str, final_result: &str) -> Status {
    match final_result {
        "ND" => return Status::Pass,
        "-" | "Invalid Mass" | "Invalid Amt" | "Error" | "" => return Status::NotApplicable,
        _ => {}
    }
    let Ok(numeric) = final_result.trim().parse::<f64>() else {
        return Status::Error;
    };
    match state_limit(analyte) {
        None => Status::NotApplicable,
        Some(limit) if numeric > limit => Status::Fail,
        Some(_) => Status::Pass,
    }
}

/// Suggested dilution multiple for an over-range raw concentration
pub fn compute_dilution_recommendation(calc_conc: Option<f64>) -> String {
    match calc_conc {
        Some(c) if !c.is_nan() && c > DILUTION_THRESHOLD => {
            format!("{}", (c / DILUTION_THRESHOLD).ceil() as i64)
        }
        _ => "-".to_string(),
    }
}

/// Parse mass text such as "1,250.5" into milligrams
pub fn parse_mass_mg(raw: Option<&str>) -> Option<f64> {
    let cleaned = raw?.replace(',', "");
    cleaned.trim().parse::<f64>().ok()
}

/// Compute results for every included sample in the worksheet
///
/// Samples appear in the order they are first encountered among included
/// rows, and so do the display rows.
pub fn process_batch(rows: &[RawReadingRow], sample_info: &SampleInfoMap) -> Result<BatchProcessOutput, ValidationError> {
    let included: Vec<&RawReadingRow> = rows
        .iter()
        .filter(|r| r.include && !r.sample.is_empty() && !r.component.is_empty())
        .collect();
    if included.is_empty() {
        return Err(ValidationError::NoIncludedRows);
    }

    let mut sample_order: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for row in &included {
        if seen.insert(row.sample.as_str()) {
            sample_order.push(row.sample.as_str());
        }
    }

    let mut output = BatchProcessOutput::default();
    for sample_key in sample_order {
        let subset: Vec<&RawReadingRow> = included.iter().copied().filter(|r| r.sample == sample_key).collect();
        if let Some(processed) = process_sample(sample_key, &subset, sample_info) {
            output.display_rows.extend(processed.results.iter().map(|r| DisplayRow {
                sample: processed.sample.clone(),
                component: r.component.clone(),
                status: r.status,
                dil: r.dil.clone(),
            }));
            output.samples.push(processed);
        } else {
            debug!(sample = %sample_key, "No numeric readings for sample, skipped");
        }
    }

    if output.samples.is_empty() {
        return Err(ValidationError::NoSamplesProduced);
    }

    info!(
        samples = output.samples.len(),
        results = output.display_rows.len(),
        "Residue computation complete"
    );
    Ok(output)
}

fn process_sample(sample_key: &str, rows: &[&RawReadingRow], sample_info: &SampleInfoMap) -> Option<ProcessedSample> {
    // Numeric readings only, first occurrence per analyte
    let mut seen_analytes: HashSet<String> = HashSet::new();
    let retained: Vec<(String, &RawReadingRow, f64)> = rows
        .iter()
        .filter_map(|row| row.calc_conc.filter(|c| !c.is_nan()).map(|conc| (row, conc)))
        .filter_map(|(row, conc)| {
            let analyte = canonical_analyte(&row.component);
            seen_analytes.insert(analyte.clone()).then_some((analyte, *row, conc))
        })
        .collect();
    if retained.is_empty() {
        return None;
    }

    let info = sample_info.get(sample_key).cloned().unwrap_or_default();
    let mass_mg = parse_mass_mg(info.sample_weight.as_deref());
    let dilution_factor = retained
        .iter()
        .find_map(|(_, row, _)| row.dilution_factor.filter(|d| !d.is_nan()));

    if mass_mg.is_none() {
        debug!(sample = %sample_key, weight = ?info.sample_weight, "Sample has no usable mass");
    }

    let results = retained
        .into_iter()
        .map(|(analyte, row, conc)| {
            let final_result = compute_final_result(Some(conc), mass_mg, dilution_factor);
            let status = status_from_final(&analyte, final_result.as_str());
            AnalyteResult {
                dil: compute_dilution_recommendation(Some(conc)),
                analyte,
                component: row.component.clone(),
                calc_conc: conc,
                final_result,
                status,
            }
        })
        .collect();

    Some(ProcessedSample {
        sample: sample_key.to_string(),
        batch_number: info.batch_number,
        sample_name: info.sample_name,
        custom_formatted_id: info.custom_formatted_id,
        sample_date: info.sample_date,
        dilution_factor,
        mass_mg,
        results,
    })
}
