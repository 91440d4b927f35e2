//! Raw row extraction from the first worksheet
//!
//! The sheet layout shared by the template, the export and the import:
//! header row, optional "requirements" annotation row, then one lead per row.

use calamine::{Data, Range};
use chrono::{NaiveDateTime, NaiveTime};

/// Zero-based column positions of the lead sheet
pub mod column {
    /// Display only, never read
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const PHONE: usize = 2;
    pub const LEAD_DATE: usize = 3;
    pub const BRAND: usize = 4;
    pub const LABEL: usize = 5;
    pub const CHAT_STATUS: usize = 6;
    pub const CITY: usize = 7;
    pub const PROVINCE: usize = 8;
    /// Display only, never read
    pub const CREATED_BY: usize = 9;
    pub const WEBINAR: usize = 10;
    pub const COMMENT: usize = 11;

    pub const COUNT: usize = 12;
}

/// One non-blank data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the sheet
    pub line: u32,
    pub cells: Vec<String>,
    /// Columns whose cell held a number rather than text
    pub numeric: Vec<usize>,
}

impl RawRow {
    /// Row of text cells
    pub fn new(line: u32, cells: Vec<String>) -> Self {
        Self { line, cells, numeric: Vec::new() }
    }

    /// Cell text, empty when the row is shorter than `index`
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn is_numeric(&self, index: usize) -> bool {
        self.numeric.contains(&index)
    }
}

/// The template's second row explains each column in parentheses,
/// e.g. "(required)" under the name header.
pub fn looks_like_annotation_row(cells: &[String]) -> bool {
    cells
        .get(column::NAME)
        .is_some_and(|cell| cell.contains('('))
}

/// Lazy, single-pass iterator over the data rows of a worksheet
pub struct RowExtractor {
    range: Range<Data>,
    next_row: usize,
}

impl RowExtractor {
    pub fn new(range: Range<Data>) -> Self {
        Self { range, next_row: 0 }
    }

    /// Cells of a range row, padded so that positions are absolute sheet
    /// columns, plus the absolute columns of plain number cells
    fn cells_at(&self, row: usize) -> (Vec<String>, Vec<usize>) {
        let first_col = self.range.start().map(|(_, c)| c as usize).unwrap_or(0);
        let mut cells = vec![String::new(); first_col];
        let mut numeric = Vec::new();
        for col in 0..self.range.width() {
            let cell = self.range.get((row, col));
            if matches!(cell, Some(Data::Int(_) | Data::Float(_))) {
                numeric.push(first_col + col);
            }
            cells.push(cell.map(cell_to_string).unwrap_or_default());
        }
        (cells, numeric)
    }

    fn line_of(&self, row: usize) -> u32 {
        let first_row = self.range.start().map(|(r, _)| r).unwrap_or(0);
        first_row + row as u32 + 1
    }
}

impl Iterator for RowExtractor {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        while self.next_row < self.range.height() {
            let row = self.next_row;
            self.next_row += 1;

            // header
            if row == 0 {
                continue;
            }

            let (cells, numeric) = self.cells_at(row);
            if row == 1 && looks_like_annotation_row(&cells) {
                continue;
            }
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }

            return Some(RawRow {
                line: self.line_of(row),
                cells,
                numeric,
            });
        }
        None
    }
}

/// Positional text of a cell
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => float_to_string(*v),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => datetime_to_string(value),
            None => float_to_string(dt.as_f64()),
        },
    }
}

fn float_to_string(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn datetime_to_string(value: NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
