//! Cell-level access used by the index builder and the walker.
//!
//! Rows and columns are 1-based, as they are displayed in a spreadsheet.

use crate::reader::{CellValue, HighlightedRange, Sheet};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Background and font colour, as legacy palette indices (1..=56)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Highlight {
    pub background: u32,
    pub font: u32,
}

impl Default for Highlight {
    fn default() -> Self {
        // Yellow fill, blue text
        Self {
            background: 6,
            font: 5,
        }
    }
}

pub trait SpreadsheetAccess {
    fn cell_value(&self, row: u32, col: u32) -> &CellValue;
    fn set_cell_value(&mut self, row: u32, col: u32, value: CellValue);
    fn set_display_format(&mut self, row: u32, col: u32, format: &str);
    fn set_range_highlight(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        highlight: Highlight,
    );
    /// Last used row, 0 for an empty sheet
    fn used_row_count(&self) -> u32;
    /// Last used column, 0 for an empty sheet
    fn used_column_count(&self) -> u32;
    /// Rows in `rows` whose cell in `col` equals `value` exactly, top to bottom
    fn find_all_exact_matches(&self, rows: RangeInclusive<u32>, col: u32, value: &str) -> Vec<u32>;
}

static EMPTY: CellValue = CellValue::Empty;

impl SpreadsheetAccess for Sheet {
    fn cell_value(&self, row: u32, col: u32) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    fn set_cell_value(&mut self, row: u32, col: u32, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.extend_used_range(row, col);
            self.cells.insert((row, col), value.clone());
        }
        self.edits.values.insert((row, col), value);
    }

    fn set_display_format(&mut self, row: u32, col: u32, format: &str) {
        self.edits.formats.insert((row, col), format.to_string());
    }

    fn set_range_highlight(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        highlight: Highlight,
    ) {
        let range = HighlightedRange {
            row_start: row_start.min(row_end),
            col_start: col_start.min(col_end),
            row_end: row_start.max(row_end),
            col_end: col_start.max(col_end),
            highlight,
        };
        // A second pass over the same rows must not stack duplicates
        if !self.edits.highlights.contains(&range) {
            self.edits.highlights.push(range);
        }
    }

    fn used_row_count(&self) -> u32 {
        self.used_range.map(|(rows, _)| rows).unwrap_or(0)
    }

    fn used_column_count(&self) -> u32 {
        self.used_range.map(|(_, cols)| cols).unwrap_or(0)
    }

    fn find_all_exact_matches(&self, rows: RangeInclusive<u32>, col: u32, value: &str) -> Vec<u32> {
        rows.filter(|&row| {
            self.cell_value(row, col)
                .to_text()
                .is_some_and(|text| text == value)
        })
        .collect()
    }
}
