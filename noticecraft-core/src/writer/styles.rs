// ! Cell format derivation for xl/styles.xml

use super::{NumFmt, attr_value};
use crate::access::Highlight;
use crate::error::{NoticeError, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::{Cursor, Write};

/// First id available to custom number formats
const FIRST_CUSTOM_NUM_FMT: u32 = 164;
/// OOXML `indexed` colours start with eight fixed entries before the
/// legacy 56-colour palette
const PALETTE_OFFSET: u32 = 7;
/// System background colour
const SYSTEM_BACKGROUND: u32 = 64;

const DEFAULT_FONT: &str = r#"<font><sz val="11"/><name val="Calibri"/></font>"#;

#[derive(Debug, Clone, PartialEq)]
struct Xf {
    /// Attributes exactly as found in the file
    attrs: Vec<(String, String)>,
    /// Child elements (alignment, protection) as raw XML
    inner: String,
}

impl Xf {
    fn default_cell() -> Self {
        Self {
            attrs: ["numFmtId", "fontId", "fillId", "borderId", "xfId"]
                .iter()
                .map(|k| (k.to_string(), "0".to_string()))
                .collect(),
            inner: String::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: impl ToString) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StyleKey {
    base: u32,
    num_fmt: Option<NumFmt>,
    highlight: Option<Highlight>,
}

/// Parsed view of a styles part that can grow new cell formats
#[derive(Debug)]
pub(crate) struct StyleSheet {
    xml: String,
    num_fmt_count: u32,
    max_num_fmt_id: u32,
    fonts: Vec<String>,
    fill_count: u32,
    xfs: Vec<Xf>,
    new_num_fmts: Vec<(u32, String)>,
    new_fonts: Vec<String>,
    new_fills: Vec<String>,
    new_xfs: Vec<Xf>,
    derived: HashMap<StyleKey, u32>,
    custom_ids: HashMap<String, u32>,
    fill_ids: HashMap<u32, u32>,
    font_ids: HashMap<(u32, u32), u32>,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    NumFmts,
    Fonts,
    Fills,
    CellXfs,
}

impl StyleSheet {
    pub(crate) fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut section = Section::None;
        let mut num_fmt_count = 0;
        let mut max_num_fmt_id = 0;
        let mut fonts = Vec::new();
        let mut fill_count = 0;
        let mut xfs = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => match (section, e.name().as_ref()) {
                    (_, b"numFmts") => section = Section::NumFmts,
                    (_, b"fonts") => section = Section::Fonts,
                    (_, b"fills") => section = Section::Fills,
                    (_, b"cellXfs") => section = Section::CellXfs,
                    (Section::NumFmts, b"numFmt") => {
                        num_fmt_count += 1;
                        max_num_fmt_id = max_num_fmt_id.max(num_fmt_id(&e)?);
                        reader.read_to_end(e.name())?;
                    }
                    (Section::Fonts, b"font") => fonts.push(capture_element(&mut reader, &e)?),
                    (Section::Fills, b"fill") => {
                        fill_count += 1;
                        reader.read_to_end(e.name())?;
                    }
                    (Section::CellXfs, b"xf") => {
                        let attrs = raw_attributes(&e)?;
                        let inner = capture_inner(&mut reader, b"xf")?;
                        xfs.push(Xf { attrs, inner });
                    }
                    _ => {}
                },
                Event::Empty(e) => match (section, e.name().as_ref()) {
                    (Section::NumFmts, b"numFmt") => {
                        num_fmt_count += 1;
                        max_num_fmt_id = max_num_fmt_id.max(num_fmt_id(&e)?);
                    }
                    (Section::Fonts, b"font") => fonts.push(render_empty(&e)?),
                    (Section::Fills, b"fill") => fill_count += 1,
                    (Section::CellXfs, b"xf") => xfs.push(Xf {
                        attrs: raw_attributes(&e)?,
                        inner: String::new(),
                    }),
                    _ => {}
                },
                Event::End(e) => {
                    if matches!(
                        e.name().as_ref(),
                        b"numFmts" | b"fonts" | b"fills" | b"cellXfs"
                    ) {
                        section = Section::None;
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            xml: xml.to_string(),
            num_fmt_count,
            max_num_fmt_id,
            fonts,
            fill_count,
            xfs,
            new_num_fmts: Vec::new(),
            new_fonts: Vec::new(),
            new_fills: Vec::new(),
            new_xfs: Vec::new(),
            derived: HashMap::new(),
            custom_ids: HashMap::new(),
            fill_ids: HashMap::new(),
            font_ids: HashMap::new(),
        })
    }

    pub(crate) fn cell_format_count(&self) -> usize {
        self.xfs.len() + self.new_xfs.len()
    }

    /// Index of a cell format equal to `base` with the requested number
    /// format and colours, or `None` when nothing needs to change
    pub(crate) fn derive(
        &mut self,
        base: u32,
        num_fmt: Option<&NumFmt>,
        highlight: Option<Highlight>,
    ) -> Result<Option<u32>> {
        if num_fmt.is_none() && highlight.is_none() {
            return Ok(None);
        }
        let key = StyleKey {
            base,
            num_fmt: num_fmt.cloned(),
            highlight,
        };
        if let Some(&index) = self.derived.get(&key) {
            return Ok(Some(index));
        }

        let mut xf = self
            .xfs
            .get(base as usize)
            .cloned()
            .unwrap_or_else(Xf::default_cell);

        if let Some(num_fmt) = num_fmt {
            xf.set("numFmtId", self.num_fmt_id_for(num_fmt));
            xf.set("applyNumberFormat", "1");
        }
        if let Some(highlight) = highlight {
            xf.set("fillId", self.fill_for(highlight.background));
            xf.set("applyFill", "1");
            let base_font = xf.get("fontId").and_then(|v| v.parse().ok()).unwrap_or(0);
            xf.set("fontId", self.font_for(base_font, highlight.font)?);
            xf.set("applyFont", "1");
        }

        let index = self.cell_format_count() as u32;
        self.new_xfs.push(xf);
        self.derived.insert(key, index);
        Ok(Some(index))
    }

    fn num_fmt_id_for(&mut self, num_fmt: &NumFmt) -> u32 {
        match num_fmt {
            NumFmt::Builtin(id) => *id,
            NumFmt::Custom(code) => {
                if let Some(&id) = self.custom_ids.get(code) {
                    return id;
                }
                let id = (self.max_num_fmt_id + 1).max(FIRST_CUSTOM_NUM_FMT)
                    + self.new_num_fmts.len() as u32;
                self.new_num_fmts.push((id, code.clone()));
                self.custom_ids.insert(code.clone(), id);
                id
            }
        }
    }

    fn fill_for(&mut self, color_index: u32) -> u32 {
        if let Some(&id) = self.fill_ids.get(&color_index) {
            return id;
        }
        let id = self.fill_count + self.new_fills.len() as u32;
        self.new_fills.push(format!(
            r#"<fill><patternFill patternType="solid"><fgColor indexed="{}"/><bgColor indexed="{}"/></patternFill></fill>"#,
            color_index + PALETTE_OFFSET,
            SYSTEM_BACKGROUND
        ));
        self.fill_ids.insert(color_index, id);
        id
    }

    fn font_for(&mut self, base_font: u32, color_index: u32) -> Result<u32> {
        if let Some(&id) = self.font_ids.get(&(base_font, color_index)) {
            return Ok(id);
        }
        let raw = self
            .fonts
            .get(base_font as usize)
            .map(String::as_str)
            .unwrap_or(DEFAULT_FONT);
        let recolored = recolor_font(raw, color_index + PALETTE_OFFSET)?;
        let id = (self.fonts.len() + self.new_fonts.len()) as u32;
        self.new_fonts.push(recolored);
        self.font_ids.insert((base_font, color_index), id);
        Ok(id)
    }

    /// The styles part with every derived format appended
    pub(crate) fn render(&self) -> Result<String> {
        if self.new_num_fmts.is_empty() && self.new_fonts.is_empty() && self.new_xfs.is_empty() {
            return Ok(self.xml.clone());
        }

        let mut reader = Reader::from_str(&self.xml);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let mut num_fmts_done = self.new_num_fmts.is_empty();
        let mut fonts_done = self.new_fonts.is_empty();
        let mut fills_done = self.new_fills.is_empty();
        let mut xfs_done = self.new_xfs.is_empty();

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => match e.name().as_ref() {
                    b"numFmts" => {
                        let count = self.num_fmt_count + self.new_num_fmts.len() as u32;
                        writer.write_event(Event::Start(with_count(&e, count)?))?;
                    }
                    b"fonts" => {
                        if !num_fmts_done {
                            self.write_num_fmts_block(&mut writer)?;
                            num_fmts_done = true;
                        }
                        let count = self.fonts.len() + self.new_fonts.len();
                        writer.write_event(Event::Start(with_count(&e, count as u32)?))?;
                    }
                    b"fills" => {
                        let count = self.fill_count + self.new_fills.len() as u32;
                        writer.write_event(Event::Start(with_count(&e, count)?))?;
                    }
                    b"cellXfs" => {
                        let count = self.cell_format_count() as u32;
                        writer.write_event(Event::Start(with_count(&e, count)?))?;
                    }
                    _ => writer.write_event(Event::Start(e))?,
                },
                Event::End(e) => {
                    match e.name().as_ref() {
                        b"numFmts" => {
                            self.write_num_fmts(&mut writer)?;
                            num_fmts_done = true;
                        }
                        b"fonts" => {
                            write_raw(&mut writer, &self.new_fonts)?;
                            fonts_done = true;
                        }
                        b"fills" => {
                            write_raw(&mut writer, &self.new_fills)?;
                            fills_done = true;
                        }
                        b"cellXfs" => {
                            for xf in &self.new_xfs {
                                write_xf(&mut writer, xf)?;
                            }
                            xfs_done = true;
                        }
                        _ => {}
                    }
                    writer.write_event(Event::End(e))?;
                }
                e => writer.write_event(e)?,
            }
        }

        if !(num_fmts_done && fonts_done && fills_done && xfs_done) {
            return Err(NoticeError::package(
                "xl/styles.xml",
                "expected non-empty fonts, fills and cellXfs sections",
            ));
        }

        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }

    fn write_num_fmts_block<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new("numFmts");
        start.push_attribute(("count", self.new_num_fmts.len().to_string().as_str()));
        writer.write_event(Event::Start(start))?;
        self.write_num_fmts(writer)?;
        writer.write_event(Event::End(BytesEnd::new("numFmts")))?;
        Ok(())
    }

    fn write_num_fmts<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        for (id, code) in &self.new_num_fmts {
            let mut num_fmt = BytesStart::new("numFmt");
            num_fmt.push_attribute(("numFmtId", id.to_string().as_str()));
            num_fmt.push_attribute(("formatCode", code.as_str()));
            writer.write_event(Event::Empty(num_fmt))?;
        }
        Ok(())
    }
}

fn num_fmt_id(e: &BytesStart) -> Result<u32> {
    Ok(attr_value(e, b"numFmtId")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

fn raw_attributes(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        attrs.push((
            String::from_utf8(attr.key.as_ref().to_vec())?,
            String::from_utf8(attr.value.to_vec())?,
        ));
    }
    Ok(attrs)
}

/// Copy of `e` whose `count` attribute is replaced
fn with_count(e: &BytesStart, count: u32) -> Result<BytesStart<'static>> {
    let mut out = BytesStart::new(String::from_utf8(e.name().as_ref().to_vec())?);
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() != b"count" {
            out.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    out.push_attribute(("count", count.to_string().as_str()));
    Ok(out)
}

/// The element opened by `start`, including its children, as raw XML
fn capture_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Start(start.borrow()))?;
    let mut depth = 1usize;
    while depth > 0 {
        let event = reader.read_event()?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(NoticeError::package("xl/styles.xml", "unexpected end")),
            _ => {}
        }
        writer.write_event(event)?;
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Children of the element named `name` that was just opened, as raw XML
fn capture_inner(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut depth = 0usize;
    loop {
        let event = reader.read_event()?;
        match &event {
            Event::End(e) if depth == 0 && e.name().as_ref() == name => break,
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(NoticeError::package("xl/styles.xml", "unexpected end")),
            _ => {}
        }
        writer.write_event(event)?;
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn render_empty(e: &BytesStart) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Empty(e.borrow()))?;
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Replace the colour of a `<font>` element
fn recolor_font(raw: &str, indexed: u32) -> Result<String> {
    let mut reader = Reader::from_str(raw);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut color = BytesStart::new("color");
    color.push_attribute(("indexed", indexed.to_string().as_str()));

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Empty(e) if e.name().as_ref() == b"font" => {
                writer.write_event(Event::Start(e.borrow()))?;
                writer.write_event(Event::Empty(color.borrow()))?;
                writer.write_event(Event::End(BytesEnd::new("font")))?;
            }
            Event::Empty(e) if e.name().as_ref() == b"color" => {}
            Event::Start(e) if e.name().as_ref() == b"color" => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if e.name().as_ref() == b"font" => {
                writer.write_event(Event::Empty(color.borrow()))?;
                writer.write_event(Event::End(e))?;
            }
            e => writer.write_event(e)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_raw<W: Write>(writer: &mut Writer<W>, parts: &[String]) -> Result<()> {
    for part in parts {
        writer.get_mut().write_all(part.as_bytes())?;
    }
    Ok(())
}

fn write_xf<W: Write>(writer: &mut Writer<W>, xf: &Xf) -> Result<()> {
    let mut start = BytesStart::new("xf");
    for (key, value) in &xf.attrs {
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }
    if xf.inner.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        writer.get_mut().write_all(xf.inner.as_bytes())?;
        writer.write_event(Event::End(BytesEnd::new("xf")))?;
    }
    Ok(())
}
