//! Report table projections of a processed sample

use std::collections::HashMap;

use super::engine::canonical_analyte;
use super::limits::{state_limit, ANALYTES, LOQ};
use crate::models::{AnalyteResult, AnalyteTableRow, FinalResult, ProcessedSample, Status};

/// Sparse table: one row per computed result, in result order
pub fn build_results_table(sample: &ProcessedSample) -> Vec<AnalyteTableRow> {
    sample.results.iter().map(|r| table_row(&r.analyte, Some(r))).collect()
}

/// Full table over the canonical analyte universe
///
/// Analytes the sample has no result for report amount 0.0, "ND", "Pass".
pub fn build_full_analyte_table(sample: &ProcessedSample) -> Vec<AnalyteTableRow> {
    let mut by_analyte: HashMap<String, &AnalyteResult> = HashMap::new();
    for result in &sample.results {
        by_analyte
            .entry(canonical_analyte(&result.analyte))
            .or_insert(result);
    }

    ANALYTES
        .iter()
        .map(|name| table_row(name, by_analyte.get(*name).copied()))
        .collect()
}

fn table_row(analyte: &str, result: Option<&AnalyteResult>) -> AnalyteTableRow {
    let (amount, final_result, status) = match result {
        Some(r) => (r.calc_conc, r.final_result.clone(), r.status),
        None => (0.0, FinalResult::NotDetected, Status::Pass),
    };
    AnalyteTableRow {
        analyte_name: analyte.to_string(),
        analyte_amount: amount,
        loq: LOQ,
        state_limit: state_limit(analyte),
        final_result,
        status,
    }
}
