//! Raw-results worksheet reader
//!
//! The instrument export is a workbook with a "raw results" worksheet whose
//! first row is a header. Only the six leading columns are interpreted (see
//! [`crate::models::reading`]).

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::models::reading::REQUIRED_COLUMNS;
use crate::models::{Cell, RawReadingRow};

/// Worksheet holding the instrument readings
pub const RAW_SHEET_NAME: &str = "raw results";

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// Read and normalize the raw-results worksheet of `path`
pub fn read_raw_results(path: &Path) -> Result<Vec<RawReadingRow>, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::WorkbookNotFound(path.to_path_buf()));
    }

    let unreadable = |reason: String| ValidationError::WorkbookUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
    if !workbook.sheet_names().iter().any(|name| name == RAW_SHEET_NAME) {
        return Err(ValidationError::WorksheetNotFound(RAW_SHEET_NAME.to_string()));
    }

    let range = workbook
        .worksheet_range(RAW_SHEET_NAME)
        .map_err(|e| unreadable(e.to_string()))?;

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();

    debug!(path = %path.display(), rows = rows.len(), width = range.width(), "Worksheet loaded");

    let readings = parse_rows(&rows)?;
    info!(path = %path.display(), readings = readings.len(), "Raw results read");
    Ok(readings)
}

/// Normalize worksheet rows; the first row is the header
///
/// Fails when there are no data rows or fewer than six columns. Rows
/// without a sample id or component are dropped.
pub fn parse_rows(rows: &[Vec<Cell>]) -> Result<Vec<RawReadingRow>, ValidationError> {
    let Some((_header, data)) = rows.split_first() else {
        return Err(ValidationError::EmptyWorksheet(RAW_SHEET_NAME.to_string()));
    };
    if data.is_empty() {
        return Err(ValidationError::EmptyWorksheet(RAW_SHEET_NAME.to_string()));
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width < REQUIRED_COLUMNS {
        return Err(ValidationError::InsufficientColumns {
            required: REQUIRED_COLUMNS,
            found: width,
        });
    }

    Ok(data.iter().filter_map(|row| RawReadingRow::from_cells(row)).collect())
}
