//! Data models for the batch resolution and residue pipeline

pub mod reading;
pub mod result;
pub mod sample;

pub use reading::{normalize_sample_id_text, parse_include_flag, Cell, RawReadingRow};
pub use result::{
    AnalyteResult, AnalyteTableRow, BatchProcessOutput, DisplayRow, FinalResult, ProcessedSample, Status,
};
pub use sample::{SampleInfo, SampleInfoMap, SampleRecord};
