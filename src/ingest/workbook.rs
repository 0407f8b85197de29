//! Raw workbook bytes → [`SheetSource`] for the first sheet.
//!
//! Values come from calamine. For `.xlsx`, fonts, fills and merged ranges come
//! from the style overlay in [`super::styles`]; `.xls` carries values and
//! merges only.

use calamine::{Data, Dimensions, Range, Reader, Xls, Xlsx};
use std::collections::HashMap;
use std::io::Cursor;

use super::grid::MergeRegion;
use super::styles;
use crate::error::{FormError, FormResult};
use crate::types::{CellStyle, CellValue};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Largest used range (rows × columns) a sheet may span.
pub const DEFAULT_MAX_CELLS: usize = 1_000_000;

/// Inclusive, absolute (0-based) bounds of the cells carrying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsedRange {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl UsedRange {
    pub fn height(&self) -> usize {
        (self.last_row - self.first_row) as usize + 1
    }

    pub fn width(&self) -> usize {
        (self.last_col - self.first_col) as usize + 1
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    /// `range` extended to cover (row, col).
    pub fn grow(range: Option<Self>, row: u32, col: u32) -> Self {
        match range {
            None => Self {
                first_row: row,
                first_col: col,
                last_row: row,
                last_col: col,
            },
            Some(r) => Self {
                first_row: r.first_row.min(row),
                first_col: r.first_col.min(col),
                last_row: r.last_row.max(row),
                last_col: r.last_col.max(col),
            },
        }
    }

    pub fn area(&self) -> usize {
        self.height().saturating_mul(self.width())
    }

    /// Reject ranges spanning more than `max_cells` cells.
    pub fn check_area(&self, sheet: &str, max_cells: usize) -> FormResult<()> {
        if self.area() > max_cells {
            return Err(FormError::ParseFailure(format!(
                "sheet '{}' spans {} rows x {} columns, more than the {}-cell limit",
                sheet,
                self.height(),
                self.width(),
                max_cells
            )));
        }
        Ok(())
    }
}

/// Everything the grid builder needs from one worksheet, in sheet coordinates.
#[derive(Debug, Clone, Default)]
pub struct SheetSource {
    pub name: String,
    pub range: Option<UsedRange>,
    pub values: HashMap<(u32, u32), CellValue>,
    pub styles: HashMap<(u32, u32), CellStyle>,
    pub merges: Vec<MergeRegion>,
}

impl SheetSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a sheet from literal rows; the used range is the bounding box of
    /// the non-blank values.
    pub fn from_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let mut sheet = Self::new(name);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.set_value(r as u32, c as u32, CellValue::from(*value));
            }
        }
        sheet
    }

    /// Set a value and grow the used range to cover it when non-blank.
    pub fn set_value(&mut self, row: u32, col: u32, value: CellValue) {
        if !value.is_blank() {
            self.extend_range(row, col);
        }
        self.values.insert((row, col), value);
    }

    pub fn set_style(&mut self, row: u32, col: u32, style: CellStyle) {
        self.styles.insert((row, col), style);
    }

    pub fn add_merge(&mut self, merge: MergeRegion) {
        self.merges.push(merge);
    }

    pub fn value(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.values.get(&(row, col))
    }

    pub fn style(&self, row: u32, col: u32) -> Option<&CellStyle> {
        self.styles.get(&(row, col))
    }

    fn extend_range(&mut self, row: u32, col: u32) {
        self.range = Some(UsedRange::grow(self.range, row, col));
    }
}

/// Decode the first sheet of a workbook. `Ok(None)` when the workbook has no sheet.
///
/// Sheets whose used range spans more than `max_cells` cells are a
/// [`FormError::ParseFailure`]. For `.xlsx` the extent is checked before any
/// dense range is allocated; `.xls` is bounded by the format (65536 × 256)
/// and checked once calamine has read it.
pub fn read_first_sheet(bytes: &[u8], max_cells: usize) -> FormResult<Option<SheetSource>> {
    if bytes.starts_with(ZIP_MAGIC) {
        read_xlsx(bytes, max_cells)
    } else if bytes.starts_with(OLE_MAGIC) {
        read_xls(bytes, max_cells)
    } else {
        Err(FormError::ParseFailure(
            "unrecognized spreadsheet format (expected .xlsx or .xls)".to_string(),
        ))
    }
}

fn read_xlsx(bytes: &[u8], max_cells: usize) -> FormResult<Option<SheetSource>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| FormError::ParseFailure(e.to_string()))?;

    let Some(name) = workbook.sheet_names().first().cloned() else {
        return Ok(None);
    };
    let overlay = styles::read_first_sheet_overlay(bytes)?;
    if let Some(bounds) = overlay.bounds {
        bounds.check_area(&name, max_cells)?;
    }
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| FormError::ParseFailure(format!("sheet '{}': {}", name, e)))?;

    let mut sheet = sheet_from_range(&name, &range);
    if let Some(used) = sheet.range {
        used.check_area(&name, max_cells)?;
    }
    sheet.styles = overlay.styles;
    sheet.merges = overlay.merges;
    Ok(Some(sheet))
}

fn read_xls(bytes: &[u8], max_cells: usize) -> FormResult<Option<SheetSource>> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| FormError::ParseFailure(e.to_string()))?;

    let Some(name) = workbook.sheet_names().first().cloned() else {
        return Ok(None);
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| FormError::ParseFailure(format!("sheet '{}': {}", name, e)))?;

    let mut sheet = sheet_from_range(&name, &range);
    if let Some(used) = sheet.range {
        used.check_area(&name, max_cells)?;
    }
    if let Some(dims) = workbook.worksheet_merge_cells(&name) {
        sheet.merges = dims.iter().map(merge_from_dimensions).collect();
    }
    Ok(Some(sheet))
}

fn merge_from_dimensions(dims: &Dimensions) -> MergeRegion {
    MergeRegion::new(dims.start.0, dims.start.1, dims.end.0, dims.end.1)
}

fn sheet_from_range(name: &str, range: &Range<Data>) -> SheetSource {
    let mut sheet = SheetSource::new(name);
    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return sheet;
    };
    if range.is_empty() {
        return sheet;
    }

    sheet.range = Some(UsedRange {
        first_row: start.0,
        first_col: start.1,
        last_row: end.0,
        last_col: end.1,
    });
    for (r, c, data) in range.cells() {
        let value = to_cell_value(data);
        if value != CellValue::Blank {
            sheet
                .values
                .insert((start.0 + r as u32, start.1 + c as u32), value);
        }
    }
    sheet
}

fn to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Blank,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_range_is_bounding_box() {
        let sheet = SheetSource::from_rows("S", &[&["", ""], &["", "a", "", "b"], &["", ""]]);
        let range = sheet.range.unwrap();
        assert_eq!((range.first_row, range.first_col), (1, 1));
        assert_eq!((range.last_row, range.last_col), (1, 3));
        assert_eq!(range.height(), 1);
        assert_eq!(range.width(), 3);
    }

    #[test]
    fn test_from_rows_all_blank_has_no_range() {
        let sheet = SheetSource::from_rows("S", &[&["", " "]]);
        assert!(sheet.range.is_none());
    }

    #[test]
    fn test_to_cell_value() {
        assert_eq!(to_cell_value(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(to_cell_value(&Data::Empty), CellValue::Blank);
        assert_eq!(
            to_cell_value(&Data::String("STT".to_string())),
            CellValue::Text("STT".to_string())
        );
        assert_eq!(to_cell_value(&Data::String(String::new())), CellValue::Blank);
    }

    #[test]
    fn test_unknown_bytes_are_a_parse_failure() {
        let result = read_first_sheet(b"not a spreadsheet", DEFAULT_MAX_CELLS);
        assert!(matches!(result, Err(FormError::ParseFailure(_))));
    }

    #[test]
    fn test_truncated_zip_is_a_parse_failure() {
        let result = read_first_sheet(b"PK\x03\x04garbage", DEFAULT_MAX_CELLS);
        assert!(matches!(result, Err(FormError::ParseFailure(_))));
    }

    #[test]
    fn test_broken_xls_is_a_parse_failure() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let result = read_first_sheet(&bytes, DEFAULT_MAX_CELLS);
        assert!(matches!(result, Err(FormError::ParseFailure(_))));
    }

    #[test]
    fn test_sheet_from_range_keeps_absolute_offset() {
        let mut range: Range<Data> = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("STT".to_string()));
        range.set_value((3, 2), Data::Float(4.0));
        let sheet = sheet_from_range("Old", &range);

        let used = sheet.range.unwrap();
        assert_eq!((used.first_row, used.first_col), (2, 1));
        assert_eq!((used.last_row, used.last_col), (3, 2));
        assert_eq!(sheet.value(2, 1), Some(&CellValue::Text("STT".to_string())));
        assert_eq!(sheet.value(3, 2), Some(&CellValue::Number(4.0)));
        assert_eq!(sheet.value(2, 2), None);
    }

    #[test]
    fn test_xls_merge_dimensions_map_to_regions() {
        let dims = Dimensions {
            start: (3, 0),
            end: (4, 0),
        };
        let merge = merge_from_dimensions(&dims);
        assert_eq!(merge, MergeRegion::new(3, 0, 4, 0));
        assert!(merge.contains(4, 0));
        assert!(!merge.contains(4, 1));
    }

    #[test]
    fn test_check_area() {
        let range = UsedRange::grow(Some(UsedRange::grow(None, 0, 0)), 9, 9);
        assert_eq!(range.area(), 100);
        assert!(range.check_area("S", 100).is_ok());
        assert!(matches!(
            range.check_area("S", 99),
            Err(FormError::ParseFailure(msg)) if msg.contains("10 rows x 10 columns")
        ));
    }

    #[test]
    fn test_grow_from_none() {
        let range = UsedRange::grow(None, 4, 2);
        assert_eq!((range.height(), range.width()), (1, 1));
    }
}
