//! Raw instrument reading rows
//!
//! Worksheet column contract (positional):
//! `sample id | component | (unused) | concentration | dilution factor | include`

use serde::{Deserialize, Serialize};

/// Number of leading columns the reader interprets
pub const REQUIRED_COLUMNS: usize = 6;

/// Include-flag spellings treated as true (compared upper-cased)
const TRUTHY_FLAGS: [&str; 4] = ["YES", "Y", "TRUE", "1"];

static EMPTY_CELL: Cell = Cell::Empty;

/// Spreadsheet cell, independent of the workbook library
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Cell content as display text, trimmed
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => number_text(*n),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }

    /// Numeric coercion; anything non-numeric becomes `None`
    pub fn number(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty | Cell::Bool(_) => None,
        };
        value.filter(|v| !v.is_nan())
    }
}

/// One normalized worksheet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReadingRow {
    /// Normalized sample key (see [`normalize_sample_id_text`])
    pub sample: String,
    /// Component label as reported by the instrument
    pub component: String,
    /// Calculated concentration, `None` when not numeric
    pub calc_conc: Option<f64>,
    pub dilution_factor: Option<f64>,
    pub include: bool,
}

impl RawReadingRow {
    /// Build a row from positional cells
    ///
    /// Returns `None` for rows whose sample id or component is empty after
    /// normalization. Missing trailing cells read as empty.
    pub fn from_cells(cells: &[Cell]) -> Option<Self> {
        let cell = |idx: usize| cells.get(idx).unwrap_or(&EMPTY_CELL);

        let sample = normalize_cell_id(cell(0));
        let component = cell(1).text();
        if sample.is_empty() || component.is_empty() {
            return None;
        }

        Some(Self {
            sample,
            component,
            calc_conc: cell(3).number(),
            dilution_factor: cell(4).number(),
            include: parse_include_flag(cell(5)),
        })
    }
}

/// Truthy include flag: "YES", "Y", "TRUE" or "1", case-insensitive
pub fn parse_include_flag(cell: &Cell) -> bool {
    let text = cell.text().to_uppercase();
    TRUTHY_FLAGS.contains(&text.as_str())
}

fn normalize_cell_id(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => number_text(*n),
        other => normalize_sample_id_text(&other.text()),
    }
}

/// Normalize a sample identifier so worksheet and LIMS keys line up
///
/// Surrounding whitespace is dropped and integer-valued numeric text is
/// rendered as a plain integer (`"42.0"` → `"42"`, `"007"` → `"7"`).
/// Everything else is returned trimmed.
pub fn normalize_sample_id_text(value: &str) -> String {
    let s = value.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = s.trim_start_matches('0');
        return if stripped.is_empty() { "0".to_string() } else { stripped.to_string() };
    }
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        _ => s.to_string(),
    }
}

/// Render a number the way ids and labels expect: integers without ".0"
pub(crate) fn number_text(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
