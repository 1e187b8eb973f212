//! Excel/ODS file reader using calamine

use crate::error::{NoticeError, Result};
use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use std::path::Path;

pub mod workbook;

pub use workbook::{CellValue, HighlightedRange, Sheet, SheetEdits, Workbook, WorkbookFormat};

/// Read a workbook from a file path
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    let format = WorkbookFormat::from_path(path)
        .ok_or_else(|| NoticeError::UnsupportedFormat(path.to_path_buf()))?;

    let mut excel: Sheets<_> =
        open_workbook_auto(path).map_err(|source| NoticeError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

    let sheet_names = excel.sheet_names();
    if sheet_names.is_empty() {
        return Err(NoticeError::EmptyWorkbook(path.to_path_buf()));
    }

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in &sheet_names {
        // Chart sheets and similar have no cell range
        let range = excel.worksheet_range(sheet_name).ok();
        sheets.push(parse_sheet(sheet_name, range.as_ref()));
    }

    log::debug!("loaded {} sheet(s) from {}", sheets.len(), path.display());

    Ok(Workbook {
        path: path.to_path_buf(),
        format,
        sheets,
    })
}

fn parse_sheet(name: &str, range: Option<&Range<Data>>) -> Sheet {
    let mut sheet = Sheet::new(name);

    let Some(range) = range else {
        return sheet;
    };
    let Some((start_row, start_col)) = range.start() else {
        return sheet;
    };

    for (rel_row, rel_col, data) in range.used_cells() {
        let row = start_row + rel_row as u32 + 1;
        let col = start_col + rel_col as u32 + 1;
        sheet.insert(row, col, parse_cell_value(data));
    }

    sheet
}

fn parse_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        Data::Empty => CellValue::Empty,
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_value_keeps_types() {
        assert_eq!(parse_cell_value(&Data::Int(101)), CellValue::Number(101.0));
        assert_eq!(
            parse_cell_value(&Data::String("学号：1".into())),
            CellValue::Text("学号：1".into())
        );
        assert_eq!(parse_cell_value(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = read_workbook("notes.txt").unwrap_err();
        assert!(matches!(err, NoticeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_file_access_error() {
        let err = read_workbook("/nonexistent/dir/book.xlsx").unwrap_err();
        assert!(matches!(err, NoticeError::FileAccess { .. }));
    }
}
