//! OOXML style overlay for the first worksheet.
//!
//! calamine exposes values only, so fonts, fills and merged ranges are read
//! straight from the package: `xl/workbook.xml` + rels locate the first sheet,
//! `xl/styles.xml` gives the `cellXfs` table, and the sheet part gives each
//! cell's `s` index and the `<mergeCell>` list. The same pass records the
//! bounding box of every `<c>` element, so the sheet's extent is known before
//! calamine materializes its dense range.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::grid::{parse_cell_ref, MergeRegion};
use super::workbook::UsedRange;
use crate::error::{FormError, FormResult};
use crate::types::{CellStyle, FillStyle, FontStyle};

/// Styles and merges of one sheet, keyed by absolute (row, col).
#[derive(Debug, Default)]
pub struct StyleOverlay {
    pub styles: HashMap<(u32, u32), CellStyle>,
    pub merges: Vec<MergeRegion>,
    /// Bounding box of all `<c>` elements, blank ones included.
    pub bounds: Option<UsedRange>,
}

pub fn read_first_sheet_overlay(bytes: &[u8]) -> FormResult<StyleOverlay> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| FormError::ParseFailure(e.to_string()))?;

    let Some(sheet_path) = first_sheet_path(&mut archive)? else {
        return Ok(StyleOverlay::default());
    };
    let cell_xfs = match read_part(&mut archive, "xl/styles.xml")? {
        Some(xml) => parse_cell_xfs(&xml)?,
        None => Vec::new(),
    };
    match read_part(&mut archive, &sheet_path)? {
        Some(xml) => parse_sheet_overlay(&xml, &cell_xfs),
        None => Ok(StyleOverlay::default()),
    }
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> FormResult<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(FormError::ParseFailure(e.to_string())),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| FormError::ParseFailure(format!("{}: {}", name, e)))?;
    Ok(Some(xml))
}

fn xml_error(e: impl std::fmt::Display) -> FormError {
    FormError::ParseFailure(format!("XML parsing error: {}", e))
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> FormResult<Option<String>> {
    for a in e.attributes().flatten() {
        if a.key.local_name().as_ref() == local {
            return Ok(Some(a.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// Resolve the part name of the first `<sheet>` in workbook order.
fn first_sheet_path<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> FormResult<Option<String>> {
    let Some(workbook_xml) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(None);
    };

    let mut rid = None;
    let mut reader = Reader::from_str(&workbook_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                rid = attr(&e, b"id")?;
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let Some(rid) = rid else {
        return Ok(None);
    };

    let Some(rels_xml) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(None);
    };
    let mut reader = Reader::from_str(&rels_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id")?.as_deref() == Some(rid.as_str()) {
                    return Ok(attr(&e, b"Target")?.map(|t| resolve_target(&t)));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn is_truthy(val: Option<&str>) -> bool {
    !matches!(val, Some("0") | Some("false"))
}

/// Parse `styles.xml` into one resolved [`CellStyle`] per `cellXfs` entry.
fn parse_cell_xfs(xml: &str) -> FormResult<Vec<CellStyle>> {
    let mut fonts: Vec<FontStyle> = Vec::new();
    let mut fills: Vec<FillStyle> = Vec::new();
    let mut xfs: Vec<(usize, usize)> = Vec::new();

    let mut in_fonts = false;
    let mut in_fills = false;
    let mut in_cell_xfs = false;
    let mut font: Option<FontStyle> = None;
    let mut fill: Option<FillStyle> = None;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        let event = reader.read_event().map_err(xml_error)?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"fonts" => in_fonts = !is_empty,
                b"fills" => in_fills = !is_empty,
                b"cellXfs" => in_cell_xfs = !is_empty,
                b"font" if in_fonts => {
                    if is_empty {
                        fonts.push(FontStyle::default());
                    } else {
                        font = Some(FontStyle::default());
                    }
                }
                b"i" => {
                    if let Some(f) = font.as_mut() {
                        f.italic = is_truthy(attr(&e, b"val")?.as_deref());
                    }
                }
                b"fill" if in_fills => {
                    if is_empty {
                        fills.push(FillStyle::default());
                    } else {
                        fill = Some(FillStyle::default());
                    }
                }
                b"patternFill" => {
                    if let Some(f) = fill.as_mut() {
                        f.pattern = attr(&e, b"patternType")?;
                    }
                }
                b"gradientFill" => {
                    if let Some(f) = fill.as_mut() {
                        f.pattern = Some("gradient".to_string());
                    }
                }
                b"fgColor" => {
                    if let Some(f) = fill.as_mut() {
                        f.has_foreground = has_color(&e);
                    }
                }
                b"bgColor" => {
                    if let Some(f) = fill.as_mut() {
                        f.has_background = has_color(&e);
                    }
                }
                b"xf" if in_cell_xfs => {
                    let font_id = attr(&e, b"fontId")?.and_then(|v| v.parse().ok()).unwrap_or(0);
                    let fill_id = attr(&e, b"fillId")?.and_then(|v| v.parse().ok()).unwrap_or(0);
                    xfs.push((font_id, fill_id));
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"fonts" => in_fonts = false,
                b"fills" => in_fills = false,
                b"cellXfs" => in_cell_xfs = false,
                b"font" => {
                    if let Some(f) = font.take() {
                        fonts.push(f);
                    }
                }
                b"fill" => {
                    if let Some(f) = fill.take() {
                        fills.push(f);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(xfs
        .into_iter()
        .map(|(font_id, fill_id)| CellStyle {
            fill: fills.get(fill_id).cloned(),
            font: fonts.get(font_id).cloned().unwrap_or_default(),
        })
        .collect())
}

fn has_color(e: &BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|a| {
        matches!(
            a.key.local_name().as_ref(),
            b"rgb" | b"theme" | b"indexed" | b"auto"
        )
    })
}

fn parse_sheet_overlay(xml: &str, cell_xfs: &[CellStyle]) -> FormResult<StyleOverlay> {
    let mut overlay = StyleOverlay::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    // cells without `r` take their row from here
                    let row = attr(&e, b"r")?.and_then(|r| r.parse::<u32>().ok());
                    if let Some(row) = row.and_then(|r| r.checked_sub(1)) {
                        let col = overlay.bounds.map_or(0, |b| b.first_col);
                        overlay.bounds = Some(UsedRange::grow(overlay.bounds, row, col));
                    }
                }
                b"c" => {
                    let position = attr(&e, b"r")?.as_deref().and_then(parse_cell_ref);
                    if let Some((row, col)) = position {
                        overlay.bounds = Some(UsedRange::grow(overlay.bounds, row, col));
                    }
                    let style = attr(&e, b"s")?
                        .and_then(|s| s.parse::<usize>().ok())
                        .and_then(|idx| cell_xfs.get(idx));
                    if let (Some(position), Some(style)) = (position, style) {
                        overlay.styles.insert(position, style.clone());
                    }
                }
                b"mergeCell" => {
                    if let Some(merge) = attr(&e, b"ref")?.as_deref().and_then(MergeRegion::parse) {
                        overlay.merges.push(merge);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(overlay)
}
