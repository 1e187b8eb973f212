// ! XLSX writer functionality for applying cell edits to the first worksheet

use super::styles::StyleSheet;
use super::{CellPatch, attr_value};
use crate::cell_ref::CellRef;
use crate::error::{NoticeError, Result};
use crate::reader::CellValue;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write};
use zip::{ZipArchive, ZipWriter, write::FileOptions};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";

/// A patch whose cell format has been resolved against the styles part
#[derive(Debug)]
pub(crate) struct ResolvedPatch<'a> {
    pub value: Option<&'a CellValue>,
    pub style: Option<u32>,
}

type RowPatches<'p, 'a> = BTreeMap<u32, &'p ResolvedPatch<'a>>;

/// Copy the package from `archive` to `output`, rewriting the first
/// worksheet and the styles part
pub(crate) fn apply_edits<R: Read + Seek, W: Write + Seek>(
    mut archive: ZipArchive<R>,
    output: W,
    patches: &BTreeMap<(u32, u32), CellPatch>,
) -> Result<()> {
    let sheet_part = first_sheet_part(&mut archive)?;
    let sheet_xml = read_file_from_zip(&mut archive, &sheet_part)?;
    let mut styles = StyleSheet::parse(&read_file_from_zip(&mut archive, STYLES_PART)?)?;

    let base_styles = existing_cell_styles(&sheet_xml, patches)?;
    let mut resolved = BTreeMap::new();
    for (&pos, patch) in patches {
        let base = base_styles.get(&pos).copied().unwrap_or(0);
        let style = styles.derive(base, patch.num_fmt.as_ref(), patch.highlight)?;
        resolved.insert(
            pos,
            ResolvedPatch {
                value: patch.value.as_ref(),
                style,
            },
        );
    }

    let new_sheet = rewrite_sheet_xml(&sheet_xml, &resolved)?;
    let new_styles = styles.render()?;

    let mut zip_writer = ZipWriter::new(output);
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();

        if file.is_dir() {
            zip_writer.add_directory(name.as_str(), FileOptions::<()>::default())?;
            continue;
        }

        zip_writer.start_file(name.as_str(), FileOptions::<()>::default())?;
        if name == sheet_part {
            zip_writer.write_all(new_sheet.as_bytes())?;
        } else if name == STYLES_PART {
            zip_writer.write_all(new_styles.as_bytes())?;
        } else {
            // Copy file as is
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer)?;
            zip_writer.write_all(&buffer)?;
        }
    }

    zip_writer.finish()?;
    Ok(())
}

// Helper functions

fn read_file_from_zip<R: Read + Seek>(archive: &mut ZipArchive<R>, filename: &str) -> Result<String> {
    let mut file = archive.by_name(filename)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Path of the first worksheet in workbook order
fn first_sheet_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let workbook_xml = read_file_from_zip(archive, WORKBOOK_PART)?;
    let mut reader = Reader::from_str(&workbook_xml);
    let mut rel_id = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"sheet" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    // r:id, whatever the relationship prefix is called
                    if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                        rel_id = Some(String::from_utf8(attr.value.to_vec())?);
                    }
                }
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let rel_id = rel_id.ok_or_else(|| NoticeError::package(WORKBOOK_PART, "no worksheet"))?;

    let rels_xml = read_file_from_zip(archive, WORKBOOK_RELS_PART)?;
    let mut reader = Reader::from_str(&rels_xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if attr_value(&e, b"Id")?.as_deref() == Some(rel_id.as_str()) {
                    let target = attr_value(&e, b"Target")?.ok_or_else(|| {
                        NoticeError::package(WORKBOOK_RELS_PART, "relationship without target")
                    })?;
                    // Targets are relative to `xl/` unless absolute
                    return Ok(match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(NoticeError::package(
        WORKBOOK_RELS_PART,
        format!("relationship {} not found", rel_id),
    ))
}

fn row_number(e: &BytesStart, previous: u32) -> Result<u32> {
    match attr_value(e, b"r")? {
        Some(r) => r
            .parse()
            .map_err(|_| NoticeError::package("worksheet", format!("bad row number {}", r))),
        None => Ok(previous + 1),
    }
}

fn column_number(e: &BytesStart, previous: u32) -> Result<u32> {
    match attr_value(e, b"r")? {
        Some(r) => CellRef::parse(&r)
            .map(|cell| cell.col)
            .ok_or_else(|| NoticeError::package("worksheet", format!("bad cell reference {}", r))),
        None => Ok(previous + 1),
    }
}

fn style_of(e: &BytesStart) -> Result<Option<u32>> {
    Ok(attr_value(e, b"s")?.and_then(|s| s.parse().ok()))
}

/// Current format index of every patched cell that exists in the sheet
fn existing_cell_styles(
    xml: &str,
    patches: &BTreeMap<(u32, u32), CellPatch>,
) -> Result<HashMap<(u32, u32), u32>> {
    let mut reader = Reader::from_str(xml);
    let mut styles = HashMap::new();
    let mut row = 0;
    let mut col = 0;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"row" => {
                row = row_number(&e, row)?;
                col = 0;
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"c" => {
                col = column_number(&e, col)?;
                if patches.contains_key(&(row, col)) {
                    if let Some(style) = style_of(&e)? {
                        styles.insert((row, col), style);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(styles)
}

/// Apply patches to the worksheet XML, keeping rows and cells in order
pub(crate) fn rewrite_sheet_xml(
    xml: &str,
    patches: &BTreeMap<(u32, u32), ResolvedPatch>,
) -> Result<String> {
    let mut pending: BTreeMap<u32, RowPatches> = BTreeMap::new();
    for (&(row, col), patch) in patches {
        pending.entry(row).or_default().insert(col, patch);
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut in_sheet_data = false;
    let mut current_row: Option<RowPatches> = None;
    let mut row = 0;
    let mut col = 0;
    let mut skipping_cell = false;

    loop {
        let event = reader.read_event()?;
        if skipping_cell {
            if let Event::End(e) = &event {
                if e.name().as_ref() == b"c" {
                    skipping_cell = false;
                }
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.name().as_ref() == b"sheetData" => {
                writer.write_event(Event::Start(e))?;
                write_rows(&mut writer, std::mem::take(&mut pending))?;
                writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
            }
            Event::End(e) if e.name().as_ref() == b"sheetData" => {
                in_sheet_data = false;
                write_rows(&mut writer, std::mem::take(&mut pending))?;
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.name().as_ref() == b"row" => {
                row = row_number(&e, row)?;
                col = 0;
                flush_rows_before(&mut writer, &mut pending, row)?;
                current_row = Some(pending.remove(&row).unwrap_or_default());
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if in_sheet_data && e.name().as_ref() == b"row" => {
                row = row_number(&e, row)?;
                flush_rows_before(&mut writer, &mut pending, row)?;
                match pending.remove(&row) {
                    Some(cells) => {
                        writer.write_event(Event::Start(e))?;
                        write_cells(&mut writer, row, cells)?;
                        writer.write_event(Event::End(BytesEnd::new("row")))?;
                    }
                    None => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::End(e) if in_sheet_data && e.name().as_ref() == b"row" => {
                if let Some(cells) = current_row.take() {
                    write_cells(&mut writer, row, cells)?;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.name().as_ref() == b"c" => {
                col = column_number(&e, col)?;
                skipping_cell = patch_cell(&mut writer, &e, false, row, col, current_row.as_mut())?;
            }
            Event::Empty(e) if in_sheet_data && e.name().as_ref() == b"c" => {
                col = column_number(&e, col)?;
                patch_cell(&mut writer, &e, true, row, col, current_row.as_mut())?;
            }
            other => writer.write_event(other)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Write an existing cell, patched if needed. Returns true when the body of
/// the original cell has been replaced and must be skipped.
fn patch_cell<W: Write>(
    writer: &mut Writer<W>,
    e: &BytesStart,
    is_empty: bool,
    row: u32,
    col: u32,
    pending: Option<&mut RowPatches>,
) -> Result<bool> {
    let Some(pending) = pending else {
        writer.write_event(original(e, is_empty))?;
        return Ok(false);
    };

    // New cells that sort before this one
    let rest = pending.split_off(&col);
    let before = std::mem::replace(pending, rest);
    write_cells(writer, row, before)?;

    let Some(patch) = pending.remove(&col) else {
        writer.write_event(original(e, is_empty))?;
        return Ok(false);
    };

    match patch.value {
        Some(value) => {
            let style = match patch.style {
                Some(style) => Some(style),
                None => style_of(e)?,
            };
            write_cell(writer, row, col, value, style)?;
            Ok(!is_empty)
        }
        None => {
            match patch.style {
                Some(style) => writer.write_event(original(&restyle(e, style)?, is_empty))?,
                None => writer.write_event(original(e, is_empty))?,
            }
            Ok(false)
        }
    }
}

fn original<'a>(e: &'a BytesStart, is_empty: bool) -> Event<'a> {
    if is_empty {
        Event::Empty(e.borrow())
    } else {
        Event::Start(e.borrow())
    }
}

fn restyle(e: &BytesStart, style: u32) -> Result<BytesStart<'static>> {
    let mut out = BytesStart::new(String::from_utf8(e.name().as_ref().to_vec())?);
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() != b"s" {
            out.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    out.push_attribute(("s", style.to_string().as_str()));
    Ok(out)
}

fn flush_rows_before<W: Write>(
    writer: &mut Writer<W>,
    pending: &mut BTreeMap<u32, RowPatches>,
    row: u32,
) -> Result<()> {
    let rest = pending.split_off(&row);
    let before = std::mem::replace(pending, rest);
    write_rows(writer, before)
}

fn write_rows<W: Write>(writer: &mut Writer<W>, rows: BTreeMap<u32, RowPatches>) -> Result<()> {
    for (row, cells) in rows {
        let mut start = BytesStart::new("row");
        start.push_attribute(("r", row.to_string().as_str()));
        writer.write_event(Event::Start(start))?;
        write_cells(writer, row, cells)?;
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

fn write_cells<W: Write>(writer: &mut Writer<W>, row: u32, cells: RowPatches) -> Result<()> {
    for (col, patch) in cells {
        write_cell(
            writer,
            row,
            col,
            patch.value.unwrap_or(&CellValue::Empty),
            patch.style,
        )?;
    }
    Ok(())
}

/// Write one `<c>` element; text is stored inline so the shared string
/// table stays untouched
pub(crate) fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    row: u32,
    col: u32,
    value: &CellValue,
    style: Option<u32>,
) -> Result<()> {
    let reference = CellRef::new(row, col).to_excel_ref();
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style.to_string().as_str()));
    }

    match value {
        CellValue::Empty => {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        CellValue::Number(n) | CellValue::DateTime(n) => {
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "v", &n.to_string(), false)?;
        }
        CellValue::Boolean(b) => {
            start.push_attribute(("t", "b"));
            writer.write_event(Event::Start(start))?;
            write_text_element(writer, "v", if *b { "1" } else { "0" }, false)?;
        }
        CellValue::Text(text) | CellValue::Error(text) => {
            start.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let preserve = text.trim() != text;
            write_text_element(writer, "t", text, preserve)?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
    preserve_space: bool,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    if preserve_space {
        start.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
