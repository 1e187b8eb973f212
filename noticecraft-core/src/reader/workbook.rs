//! Workbook data structures

use crate::access::Highlight;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// File format of a workbook, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xlsm,
    Xlsb,
    Xls,
    Ods,
}

impl WorkbookFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(WorkbookFormat::Xlsx),
            "xlsm" => Some(WorkbookFormat::Xlsm),
            "xlsb" => Some(WorkbookFormat::Xlsb),
            "xls" => Some(WorkbookFormat::Xls),
            "ods" => Some(WorkbookFormat::Ods),
            _ => None,
        }
    }

    /// Whether the original package can be patched in place on save
    pub fn is_ooxml(self) -> bool {
        matches!(self, WorkbookFormat::Xlsx | WorkbookFormat::Xlsm)
    }
}

/// Represents a complete workbook
#[derive(Debug, Clone)]
pub struct Workbook {
    pub path: PathBuf,
    pub format: WorkbookFormat,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Get a sheet by name
    pub fn get_sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// The worksheet every operation of this tool works on
    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn first_sheet_mut(&mut self) -> Option<&mut Sheet> {
        self.sheets.first_mut()
    }

    /// Consume the workbook, keeping its first worksheet
    pub fn into_first_sheet(self) -> Option<Sheet> {
        self.sheets.into_iter().next()
    }
}

/// Represents a worksheet. Rows and columns are 1-based.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub cells: HashMap<(u32, u32), CellValue>,
    /// Last used (row, column)
    pub used_range: Option<(u32, u32)>,
    /// Changes applied since the sheet was loaded
    pub edits: SheetEdits,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a sheet from rows of values starting at A1
    pub fn from_rows<R, V>(name: &str, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let mut sheet = Sheet::new(name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                sheet.insert(r as u32 + 1, c as u32 + 1, value.into());
            }
        }
        sheet
    }

    /// Store a value as loaded, without recording an edit
    pub fn insert(&mut self, row: u32, col: u32, value: CellValue) {
        if value.is_empty() {
            return;
        }
        self.extend_used_range(row, col);
        self.cells.insert((row, col), value);
    }

    pub(crate) fn extend_used_range(&mut self, row: u32, col: u32) {
        self.used_range = Some(match self.used_range {
            Some((max_row, max_col)) => (max_row.max(row), max_col.max(col)),
            None => (row, col),
        });
    }
}

/// Cell-level changes recorded against a sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetEdits {
    pub values: BTreeMap<(u32, u32), CellValue>,
    pub formats: BTreeMap<(u32, u32), String>,
    pub highlights: Vec<HighlightedRange>,
}

impl SheetEdits {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.formats.is_empty() && self.highlights.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightedRange {
    pub row_start: u32,
    pub col_start: u32,
    pub row_end: u32,
    pub col_end: u32,
    pub highlight: Highlight,
}

impl HighlightedRange {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.row_start..=self.row_end).contains(&row)
            && (self.col_start..=self.col_end).contains(&col)
    }
}

/// Cell value types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Excel serial date/time
    DateTime(f64),
    Error(String),
}

impl CellValue {
    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Textual form used for header names, IDs and subject codes.
    ///
    /// Integral numbers render without a fractional part, so a student ID
    /// stored as a number compares equal to the same ID stored as text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) if s.is_empty() => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) | CellValue::DateTime(n) => Some(format_number(*n)),
            CellValue::Boolean(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::Error(e) => Some(e.clone()),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_render_without_fraction() {
        assert_eq!(
            CellValue::Number(1234567890123.0).to_text().as_deref(),
            Some("1234567890123")
        );
        assert_eq!(CellValue::Number(1001.0).to_text().as_deref(), Some("1001"));
        assert_eq!(CellValue::Number(0.375).to_text().as_deref(), Some("0.375"));
        assert_eq!(CellValue::Text(String::new()).to_text(), None);
    }

    #[test]
    fn test_from_rows_tracks_used_range() {
        let sheet = Sheet::from_rows("S", vec![vec!["a", "", "c"], vec!["", "", ""], vec!["x"]]);
        assert_eq!(sheet.used_range, Some((3, 3)));
        assert_eq!(sheet.cells.len(), 3);
        assert!(sheet.edits.is_empty());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            WorkbookFormat::from_path(Path::new("a/考试通知单.XLS")),
            Some(WorkbookFormat::Xls)
        );
        assert!(WorkbookFormat::Xlsm.is_ooxml());
        assert_eq!(WorkbookFormat::from_path(Path::new("notes.txt")), None);
    }
}
