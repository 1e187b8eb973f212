use noticecraft_core::reader::WorkbookFormat;
use noticecraft_core::{
    ArrangementIndex, ArrangementSource, CellValue, Layout, NoticeError, NotificationWalker,
    ProcessConfig, Reconciler, Sheet, SpreadsheetAccess, Workbook, read_workbook, save_workbook,
};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const HEADER: [&str; 7] = ["考场号", "考试日期", "考试时间", "科目", "学号", "座位号", "姓名"];

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="宋体"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"/></cellXfs></styleSheet>"#;

/// Four-digit codes are stored as numbers, everything else as an inline string
fn cell_xml(row: usize, col: usize, text: &str, style: Option<u32>) -> String {
    let reference = format!("{}{}", (b'A' + col as u8) as char, row + 1);
    let style = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();
    if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
        format!(r#"<c r="{}"{}><v>{}</v></c>"#, reference, style, text)
    } else {
        format!(
            r#"<c r="{}"{} t="inlineStr"><is><t>{}</t></is></c>"#,
            reference, style, text
        )
    }
}

// Helper to create a minimal valid XLSX file with one worksheet
fn create_mock_xlsx(path: &Path, rows: &[Vec<&str>], bordered_rows: &[usize]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#.as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#.as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(STYLES.as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    let mut sheet_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        let style = bordered_rows.contains(&(r + 1)).then_some(1);
        sheet_xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, text) in row.iter().enumerate() {
            if !text.is_empty() {
                sheet_xml.push_str(&cell_xml(r, c, text, style));
            } else if let Some(style) = style {
                sheet_xml.push_str(&format!(
                    r#"<c r="{}{}" s="{}"/>"#,
                    (b'A' + c as u8) as char,
                    r + 1,
                    style
                ));
            }
        }
        sheet_xml.push_str("</row>");
    }
    sheet_xml.push_str("</sheetData></worksheet>");
    zip.write_all(sheet_xml.as_bytes())?;

    zip.finish()?;
    Ok(())
}

fn read_part(path: &Path, name: &str) -> anyhow::Result<String> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut content = String::new();
    archive.by_name(name)?.read_to_string(&mut content)?;
    Ok(content)
}

struct Fixture {
    _dir: tempfile::TempDir,
    notification: PathBuf,
    arrangement: PathBuf,
}

fn fixture(arrangement_header: &[&str]) -> anyhow::Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let notification = dir.path().join("考试通知单纸.xlsx");
    let arrangement = dir.path().join("统设课程.xlsx");

    create_mock_xlsx(
        &notification,
        &[
            vec!["考试通知单"],
            vec!["姓名：张三  学号：1234567890123"],
            vec!["试卷号", "科目", "", "考场号", "座位号", "日期", "时间", "", "姓名"],
            vec!["1001", "高等数学", "", "", "", "", "", "", ""],
            vec!["1002", "大学英语", "", "", "", "", "", "", ""],
            vec!["考点：第一中学"],
        ],
        &[4, 5],
    )?;
    create_mock_xlsx(
        &arrangement,
        &[
            arrangement_header.to_vec(),
            vec!["101", "2024-01-01", "09:00", "1001", "1234567890123", "05", "张三"],
            vec!["102", "2024-01-02", "14:00", "1002", "1234567890123", "12", "张三"],
            vec!["201", "2024-01-01", "09:00", "1001", "1234567890124", "08", "李四"],
        ],
        &[],
    )?;

    Ok(Fixture {
        _dir: dir,
        notification,
        arrangement,
    })
}

fn text(value: &CellValue) -> String {
    value.to_text().unwrap_or_default()
}

#[test]
fn test_reconcile_writes_room_seat_date_time() -> anyhow::Result<()> {
    let fixture = fixture(&HEADER)?;
    let config = ProcessConfig::new(&fixture.notification, vec![fixture.arrangement.clone()]);

    let summary = Reconciler::new(config).run()?;

    assert_eq!(summary.sources, 1);
    assert_eq!(summary.students, 1);
    assert_eq!(summary.records, 2);
    assert_eq!(
        summary.output.file_name().and_then(|n| n.to_str()),
        Some("考试通知单-处理后.xlsx")
    );

    let workbook = read_workbook(&summary.output)?;
    let sheet = workbook.first_sheet().expect("output has a sheet");
    assert_eq!(text(sheet.cell_value(4, 4)), "101");
    assert_eq!(text(sheet.cell_value(4, 5)), "05");
    assert_eq!(text(sheet.cell_value(4, 6)), "2024-01-01");
    assert_eq!(text(sheet.cell_value(4, 7)), "09:00");
    assert_eq!(text(sheet.cell_value(5, 4)), "102");
    assert_eq!(text(sheet.cell_value(5, 5)), "12");
    // Untouched content survives
    assert_eq!(text(sheet.cell_value(2, 1)), "姓名：张三  学号：1234567890123");
    assert_eq!(text(sheet.cell_value(4, 2)), "高等数学");
    assert_eq!(sheet.cell_value(4, 9), &CellValue::Empty);

    // The input is left as it was
    let original = read_workbook(&fixture.notification)?;
    assert_eq!(
        original.first_sheet().expect("input has a sheet").cell_value(4, 4),
        &CellValue::Empty
    );
    Ok(())
}

#[test]
fn test_written_cells_keep_existing_borders() -> anyhow::Result<()> {
    let fixture = fixture(&HEADER)?;
    let config = ProcessConfig::new(&fixture.notification, vec![fixture.arrangement.clone()]);

    let summary = Reconciler::new(config).run()?;

    let sheet_xml = read_part(&summary.output, "xl/worksheets/sheet1.xml")?;
    let styles_xml = read_part(&summary.output, "xl/styles.xml")?;
    // Bordered room cell keeps format 1; the time cell gets a derived format
    assert!(sheet_xml.contains(r#"<c r="D4" s="1" t="inlineStr"><is><t>101</t></is></c>"#));
    assert!(sheet_xml.contains(r#"<c r="G4" s="2" t="inlineStr"><is><t>09:00</t></is></c>"#));
    assert!(styles_xml.contains(r#"<numFmt numFmtId="164" formatCode="[$-F400]h:mm:ss\ AM/PM"/>"#));
    assert!(styles_xml.contains(
        r#"<xf numFmtId="164" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1" applyNumberFormat="1"/>"#
    ));
    Ok(())
}

#[test]
fn test_highlight_writes_name_and_colours() -> anyhow::Result<()> {
    let fixture = fixture(&HEADER)?;
    let mut config = ProcessConfig::new(&fixture.notification, vec![fixture.arrangement.clone()]);
    config.highlight = true;

    let summary = Reconciler::new(config).run()?;

    let workbook = read_workbook(&summary.output)?;
    let sheet = workbook.first_sheet().expect("output has a sheet");
    assert_eq!(text(sheet.cell_value(4, 9)), "张三");
    assert_eq!(text(sheet.cell_value(5, 9)), "张三");

    let styles_xml = read_part(&summary.output, "xl/styles.xml")?;
    assert!(styles_xml.contains(r#"<fgColor indexed="13"/>"#));
    assert!(styles_xml.contains(r#"<color indexed="12"/>"#));

    // The blank column between time and name is coloured too
    let sheet_xml = read_part(&summary.output, "xl/worksheets/sheet1.xml")?;
    assert!(sheet_xml.contains(r#"<c r="H4" s="#));
    assert!(!sheet_xml.contains(r#"<c r="H6""#));
    Ok(())
}

#[test]
fn test_missing_seat_column_stops_before_writing() -> anyhow::Result<()> {
    let fixture = fixture(&["考场号", "考试日期", "考试时间", "科目", "学号", "备注", "姓名"])?;
    let config = ProcessConfig::new(&fixture.notification, vec![fixture.arrangement.clone()]);
    let output = config.output_path();

    let err = Reconciler::new(config).run().unwrap_err();

    match err {
        NoticeError::MissingRequiredField {
            source_label,
            field,
        } => {
            assert_eq!(source_label, "统设课程.xlsx");
            assert_eq!(field, "座位号");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_unknown_student_leaves_sheet_unchanged() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let notification = dir.path().join("通知单.xlsx");
    let arrangement = dir.path().join("省开课程.xlsx");
    create_mock_xlsx(
        &notification,
        &[
            vec!["考试通知单"],
            vec!["学号：9999999999999"],
            vec!["试卷号"],
            vec!["1001"],
        ],
        &[],
    )?;
    create_mock_xlsx(
        &arrangement,
        &[
            HEADER.to_vec(),
            vec!["101", "2024-01-01", "09:00", "1001", "1234567890123", "05", "张三"],
        ],
        &[],
    )?;

    let summary = Reconciler::new(ProcessConfig::new(&notification, vec![arrangement])).run()?;

    assert_eq!(summary.students, 1);
    assert_eq!(summary.records, 0);
    assert_eq!(
        read_part(&summary.output, "xl/worksheets/sheet1.xml")?,
        read_part(&notification, "xl/worksheets/sheet1.xml")?
    );
    Ok(())
}

#[test]
fn test_legacy_workbook_is_saved_as_xlsx_with_edits() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut sheet = Sheet::from_rows(
        "通知单",
        vec![
            vec!["考试通知单"],
            vec!["姓名：张三  学号：1234567890123"],
            vec!["试卷号", "科目"],
            vec!["1001", "高等数学"],
            vec!["考点：第一中学"],
        ],
    );
    let arrangement = Sheet::from_rows(
        "编排",
        vec![
            HEADER.to_vec(),
            vec!["101", "2024-01-01", "09:00", "1001", "1234567890123", "05", "张三"],
        ],
    );
    let index = ArrangementIndex::new(vec![ArrangementSource::new("统设.xls", arrangement)?]);
    let layout = Layout::default();

    let summary = NotificationWalker::new(&layout, true).walk(&mut sheet, &index);
    assert_eq!(summary.records, 1);

    let workbook = Workbook {
        path: dir.path().join("纸考考试通知单.xls"),
        format: WorkbookFormat::Xls,
        sheets: vec![sheet],
    };
    let output = dir.path().join("考试通知单-处理后.xlsx");
    save_workbook(&workbook, &output)?;

    let saved = read_workbook(&output)?;
    let sheet = saved.first_sheet().expect("output has a sheet");
    assert_eq!(text(sheet.cell_value(4, 4)), "101");
    assert_eq!(text(sheet.cell_value(4, 5)), "05");
    assert_eq!(text(sheet.cell_value(4, 6)), "2024-01-01");
    assert_eq!(text(sheet.cell_value(4, 7)), "09:00");
    assert_eq!(text(sheet.cell_value(4, 9)), "张三");
    assert_eq!(text(sheet.cell_value(2, 1)), "姓名：张三  学号：1234567890123");

    let styles_xml = read_part(&output, "xl/styles.xml")?;
    assert!(styles_xml.contains(r#"<fgColor indexed="13"/>"#));
    assert!(styles_xml.contains(r#"<color indexed="12"/>"#));
    let sheet_xml = read_part(&output, "xl/worksheets/sheet1.xml")?;
    assert!(sheet_xml.contains(r#"<c r="H4" s="#));
    Ok(())
}
