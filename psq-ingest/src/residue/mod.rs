//! Residue Computation Engine
//!
//! Pure transformation from raw reading rows plus sample metadata to
//! classified, formatted analyte results and their report projections.

pub mod engine;
pub mod format;
pub mod limits;
pub mod tables;

pub use engine::{
    canonical_analyte, compute_dilution_recommendation, compute_final_result, parse_mass_mg, process_batch,
    status_from_final,
};
pub use format::format_sigfigs;
pub use limits::{state_limit, ANALYTES, LOQ};
pub use tables::{build_full_analyte_table, build_results_table};
