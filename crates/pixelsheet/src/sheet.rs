//! Streaming reader for cell fills in `.xlsx` workbooks.
//!
//! Only three parts of the package are parsed, each with a pull parser so that
//! no document tree is ever built:
//!
//! - `xl/workbook.xml` and its relationships, to locate the active worksheet
//! - `xl/styles.xml`, to map every cell style index to its solid fill color
//! - the worksheet itself, which is streamed row by row through [`FillRows`]
//!
//! Memory use therefore depends on the widest row, not on the sheet size.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::color::Rgb;
use crate::{PixelSheetError, Result, Stage, MAX_COLUMNS, MAX_ROWS};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";

/// One worksheet row, reduced to the cells that carry a recognized fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillRow {
    /// 1-based row index
    pub row: u32,
    /// `(1-based column, fill color)` in document order
    pub cells: Vec<(u32, Rgb)>,
}

/// An opened workbook, positioned on its active worksheet.
pub struct SheetReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    sheet_part: String,
    style_fills: Vec<Option<Rgb>>,
}

impl SheetReader<BufReader<File>> {
    /// Opens the workbook at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| input_err(format!("'{}': {}", path.display(), e)))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> SheetReader<R> {
    /// Reads the workbook index and style table from `reader`.
    pub fn new(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(input_err)?;

        let workbook = read_part(&mut archive, WORKBOOK_PART)?;
        let (active_tab, sheet_ids) = parse_workbook(workbook.as_slice())?;
        let rel_id = sheet_ids
            .get(active_tab)
            .or_else(|| sheet_ids.first())
            .ok_or_else(|| input_err("workbook contains no worksheets"))?
            .clone();

        let rels = read_part(&mut archive, WORKBOOK_RELS_PART)?;
        let target = parse_relationship_target(rels.as_slice(), &rel_id)?
            .ok_or_else(|| input_err(format!("no relationship target for sheet '{rel_id}'")))?;
        let sheet_part = resolve_part_path(&target);

        // A workbook without a style table has no fills at all
        let style_fills = match archive.by_name(STYLES_PART) {
            Ok(part) => parse_styles(BufReader::new(part))?,
            Err(zip::result::ZipError::FileNotFound) => Vec::new(),
            Err(e) => return Err(input_err(e)),
        };

        debug!(
            "active worksheet '{}', {} cell styles ({} filled)",
            sheet_part,
            style_fills.len(),
            style_fills.iter().filter(|f| f.is_some()).count()
        );

        Ok(Self {
            archive,
            sheet_part,
            style_fills,
        })
    }

    /// Path of the worksheet part inside the package.
    pub fn sheet_part(&self) -> &str {
        &self.sheet_part
    }

    /// Starts a fresh pass over the worksheet rows.
    pub fn rows(&mut self) -> Result<impl Iterator<Item = Result<FillRow>> + '_> {
        let part = self.archive.by_name(&self.sheet_part).map_err(|e| {
            input_err(format!("worksheet '{}': {}", self.sheet_part, e))
        })?;
        Ok(FillRows::new(BufReader::new(part), &self.style_fills))
    }
}

/// Iterator over the rows of a worksheet, yielding filled cells only.
///
/// Rows without any recognized fill are still yielded with an empty cell list.
pub struct FillRows<'s, B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    state: RowState<'s>,
    done: bool,
}

struct RowState<'s> {
    style_fills: &'s [Option<Rgb>],
    current: Option<FillRow>,
    last_row: u32,
    last_col: u32,
}

impl RowState<'_> {
    fn start_row(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let row = match attribute(e, b"r")? {
            Some(r) => parse_index(&r, "row")?,
            None => self.last_row.saturating_add(1),
        };
        if row == 0 || row > MAX_ROWS {
            return Err(input_err(format!(
                "row {row} is outside the worksheet (1 to {MAX_ROWS})"
            )));
        }
        self.last_row = row;
        self.last_col = 0;
        self.current = Some(FillRow {
            row,
            cells: Vec::new(),
        });
        Ok(())
    }

    fn cell(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let col = match attribute(e, b"r")? {
            Some(reference) => {
                let (col, _) = parse_cell_ref(&reference)
                    .ok_or_else(|| input_err(format!("invalid cell reference '{reference}'")))?;
                col
            }
            None => self.last_col.saturating_add(1),
        };
        if col > MAX_COLUMNS {
            return Err(input_err(format!(
                "column {col} is outside the worksheet (1 to {MAX_COLUMNS})"
            )));
        }
        self.last_col = col;

        let style = match attribute(e, b"s")? {
            Some(s) => parse_index(&s, "style")? as usize,
            None => 0,
        };
        let fill = self.style_fills.get(style).copied().flatten();
        if let (Some(color), Some(row)) = (fill, self.current.as_mut()) {
            row.cells.push((col, color));
        }
        Ok(())
    }
}

impl<'s, B: BufRead> FillRows<'s, B> {
    /// Streams worksheet XML from `source`, resolving `s` attributes through `style_fills`.
    pub fn new(source: B, style_fills: &'s [Option<Rgb>]) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            state: RowState {
                style_fills,
                current: None,
                last_row: 0,
                last_col: 0,
            },
            done: false,
        }
    }

    fn next_row(&mut self) -> Result<Option<FillRow>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf).map_err(input_err)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"row" => self.state.start_row(&e)?,
                    b"c" => self.state.cell(&e)?,
                    _ => {}
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"row" => {
                        self.state.start_row(&e)?;
                        return Ok(self.state.current.take());
                    }
                    b"c" => self.state.cell(&e)?,
                    _ => {}
                },
                Event::End(e) => match e.local_name().as_ref() {
                    b"row" => {
                        if let Some(row) = self.state.current.take() {
                            return Ok(Some(row));
                        }
                    }
                    b"sheetData" => return Ok(None),
                    _ => {}
                },
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl<B: BufRead> Iterator for FillRows<'_, B> {
    type Item = Result<FillRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn input_err(message: impl std::fmt::Display) -> PixelSheetError {
    PixelSheetError::input(Stage::Import, message)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut part = archive
        .by_name(name)
        .map_err(|e| input_err(format!("'{name}': {e}")))?;
    let mut bytes = Vec::new();
    part.read_to_end(&mut bytes)
        .map_err(|e| input_err(format!("'{name}': {e}")))?;
    Ok(bytes)
}

/// Looks up an attribute by local name, ignoring any namespace prefix.
fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(input_err)?;
        if attr.key.local_name().as_ref() == name {
            let value: Cow<'_, [u8]> = attr.value;
            return Ok(Some(String::from_utf8_lossy(&value).into_owned()));
        }
    }
    Ok(None)
}

fn parse_index(value: &str, what: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| input_err(format!("invalid {what} index '{value}'")))
}

/// Splits an `A1`-style reference into 1-based `(column, row)`.
///
/// References outside `A1:XFD1048576` are rejected.
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.trim();
    let split = reference
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(reference.len());
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || letters.len() > 3 || digits.is_empty() {
        return None;
    }
    let col = letters.bytes().fold(0u32, |acc, b| {
        acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1)
    });
    let row: u32 = digits.parse().ok()?;
    if col > MAX_COLUMNS || row == 0 || row > MAX_ROWS {
        return None;
    }
    Some((col, row))
}

/// Returns the active tab index and the relationship id of every sheet, in order.
fn parse_workbook<B: BufRead>(source: B) -> Result<(usize, Vec<String>)> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut active_tab = 0usize;
    let mut sheets = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(input_err)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookView" => {
                    if let Some(tab) = attribute(&e, b"activeTab")? {
                        active_tab = parse_index(&tab, "active tab")? as usize;
                    }
                }
                b"sheet" => {
                    let id = attribute(&e, b"id")?
                        .ok_or_else(|| input_err("sheet entry without relationship id"))?;
                    sheets.push(id);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok((active_tab, sheets))
}

fn parse_relationship_target<B: BufRead>(source: B, id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(input_err)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(id) {
                    return attribute(&e, b"Target");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

#[derive(Default)]
struct FillBuilder {
    pattern: Option<String>,
    fg: Option<Rgb>,
    bg: Option<Rgb>,
}

impl FillBuilder {
    fn finish(self) -> Option<Rgb> {
        match self.pattern.as_deref() {
            Some("solid") => self.fg.or(self.bg),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StyleSection {
    Other,
    Fills,
    CellXfs,
}

/// Resolves every `cellXfs` entry to the solid fill color it references.
///
/// Fills using theme or indexed colors, gradients and non-solid patterns
/// resolve to `None`.
pub fn parse_styles<B: BufRead>(source: B) -> Result<Vec<Option<Rgb>>> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut section = StyleSection::Other;
    let mut fills: Vec<Option<Rgb>> = Vec::new();
    let mut fill: Option<FillBuilder> = None;
    let mut xf_fill_ids: Vec<usize> = Vec::new();

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(input_err)?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match (section, e.local_name().as_ref()) {
                (_, b"fills") if !is_empty => section = StyleSection::Fills,
                (_, b"cellXfs") if !is_empty => section = StyleSection::CellXfs,
                (StyleSection::Fills, b"fill") => {
                    if is_empty {
                        fills.push(None);
                    } else {
                        fill = Some(FillBuilder::default());
                    }
                }
                (StyleSection::Fills, b"patternFill") => {
                    if let Some(fill) = fill.as_mut() {
                        fill.pattern = attribute(&e, b"patternType")?;
                    }
                }
                (StyleSection::Fills, b"fgColor") => {
                    if let Some(fill) = fill.as_mut() {
                        fill.fg = attribute(&e, b"rgb")?.and_then(|hex| Rgb::from_hex(&hex));
                    }
                }
                (StyleSection::Fills, b"bgColor") => {
                    if let Some(fill) = fill.as_mut() {
                        fill.bg = attribute(&e, b"rgb")?.and_then(|hex| Rgb::from_hex(&hex));
                    }
                }
                (StyleSection::CellXfs, b"xf") => {
                    let fill_id = match attribute(&e, b"fillId")? {
                        Some(id) => parse_index(&id, "fill")? as usize,
                        None => 0,
                    };
                    xf_fill_ids.push(fill_id);
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"fill" => {
                    if let Some(done) = fill.take() {
                        fills.push(done.finish());
                    }
                }
                b"fills" | b"cellXfs" => section = StyleSection::Other,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(xf_fill_ids
        .into_iter()
        .map(|id| fills.get(id).copied().flatten())
        .collect())
}
