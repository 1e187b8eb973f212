// ! Writer module for saving the processed notification sheet

mod package;
mod styles;
mod xlsx_writer;

use crate::access::Highlight;
use crate::error::{NoticeError, Result};
use crate::reader::{CellValue, SheetEdits, Workbook};
use quick_xml::events::BytesStart;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::ZipArchive;

/// Number format attached to a written cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum NumFmt {
    Builtin(u32),
    Custom(String),
}

/// Built-in `m/d/yyyy`
const BUILTIN_DATE: u32 = 14;
/// Built-in `h:mm:ss`
const BUILTIN_TIME: u32 = 21;

/// Everything that changes in one cell
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CellPatch {
    pub value: Option<CellValue>,
    pub num_fmt: Option<NumFmt>,
    pub highlight: Option<Highlight>,
}

/// Save the first worksheet of `workbook`, with its edits, to `output`.
///
/// `.xlsx`/`.xlsm` inputs are patched so everything but the edited cells is
/// kept; any other input is rebuilt as a plain `.xlsx` package first.
pub fn save_workbook<P: AsRef<Path>>(workbook: &Workbook, output: P) -> Result<()> {
    let output = output.as_ref();
    if output == workbook.path {
        return Err(NoticeError::Config(format!(
            "refusing to overwrite the input workbook {}",
            output.display()
        )));
    }

    let sheet = workbook
        .first_sheet()
        .ok_or_else(|| NoticeError::EmptyWorkbook(workbook.path.clone()))?;
    let patches = collect_patches(&sheet.edits);

    // Renamed into place only after a complete write
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut out = NamedTempFile::new_in(dir)?;

    if workbook.format.is_ooxml() {
        let archive = ZipArchive::new(BufReader::new(File::open(&workbook.path)?))?;
        xlsx_writer::apply_edits(archive, out.as_file_mut(), &patches)?;
    } else {
        let package = package::build_package(sheet)?;
        let archive = ZipArchive::new(Cursor::new(package))?;
        xlsx_writer::apply_edits(archive, out.as_file_mut(), &patches)?;
    }
    out.persist(output).map_err(|e| e.error)?;

    log::info!(
        "saved {} changed cell(s) to {}",
        patches.len(),
        output.display()
    );
    Ok(())
}

/// Flatten recorded edits into one patch per cell
pub(crate) fn collect_patches(edits: &SheetEdits) -> BTreeMap<(u32, u32), CellPatch> {
    let mut patches: BTreeMap<(u32, u32), CellPatch> = BTreeMap::new();

    for (&pos, value) in &edits.values {
        let patch = patches.entry(pos).or_default();
        if let CellValue::DateTime(serial) = value {
            patch.num_fmt = Some(NumFmt::Builtin(default_date_format(*serial)));
        }
        patch.value = Some(value.clone());
    }

    for (&pos, format) in &edits.formats {
        patches.entry(pos).or_default().num_fmt = Some(NumFmt::Custom(format.clone()));
    }

    for range in &edits.highlights {
        for row in range.row_start..=range.row_end {
            for col in range.col_start..=range.col_end {
                patches.entry((row, col)).or_default().highlight = Some(range.highlight);
            }
        }
    }

    patches
}

pub(crate) fn default_date_format(serial: f64) -> u32 {
    if serial < 1.0 { BUILTIN_TIME } else { BUILTIN_DATE }
}

/// Raw (still escaped) value of an attribute
pub(crate) fn attr_value(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(String::from_utf8(attr.value.to_vec())?));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::SpreadsheetAccess;
    use crate::reader::{Sheet, WorkbookFormat};

    #[test]
    fn test_collect_patches_merges_value_format_and_highlight() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell_value(4, 7, CellValue::from("09:00"));
        sheet.set_display_format(4, 7, "h:mm");
        sheet.set_range_highlight(4, 4, 4, 9, Highlight::default());

        let patches = collect_patches(&sheet.edits);

        assert_eq!(patches.len(), 6);
        let time = &patches[&(4, 7)];
        assert_eq!(time.value, Some(CellValue::from("09:00")));
        assert_eq!(time.num_fmt, Some(NumFmt::Custom("h:mm".into())));
        assert_eq!(time.highlight, Some(Highlight::default()));
        let blank = &patches[&(4, 8)];
        assert_eq!(blank.value, None);
        assert!(blank.highlight.is_some());
    }

    #[test]
    fn test_datetime_values_get_builtin_format() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell_value(2, 6, CellValue::DateTime(45292.0));
        sheet.set_cell_value(2, 7, CellValue::DateTime(0.375));

        let patches = collect_patches(&sheet.edits);

        assert_eq!(patches[&(2, 6)].num_fmt, Some(NumFmt::Builtin(BUILTIN_DATE)));
        assert_eq!(patches[&(2, 7)].num_fmt, Some(NumFmt::Builtin(BUILTIN_TIME)));
    }

    #[test]
    fn test_failed_save_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("通知单.xlsx");
        // A zip without any workbook parts
        zip::ZipWriter::new(File::create(&input).unwrap())
            .finish()
            .unwrap();

        let mut sheet = Sheet::new("S");
        sheet.set_cell_value(4, 4, CellValue::from("101"));
        let workbook = Workbook {
            path: input.clone(),
            format: WorkbookFormat::Xlsx,
            sheets: vec![sheet],
        };
        let output = dir.path().join("考试通知单-处理后.xlsx");

        assert!(save_workbook(&workbook, &output).is_err());

        assert!(!output.exists());
        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_save_refuses_to_overwrite_input() {
        let workbook = Workbook {
            path: "通知单.xlsx".into(),
            format: WorkbookFormat::Xlsx,
            sheets: vec![Sheet::new("S")],
        };
        let err = save_workbook(&workbook, "通知单.xlsx").unwrap_err();
        assert!(matches!(err, NoticeError::Config(_)));
    }
}
