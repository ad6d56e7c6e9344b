//! Pipeline services around the LIMS client and the residue engine

pub mod export;
pub mod raw_results;
pub mod sample_info;

pub use export::{export_sample_report, export_samples_to_directory, SampleReport};
pub use raw_results::{read_raw_results, RAW_SHEET_NAME};
pub use sample_info::{collect_sample_info, SampleInfoCollection};
