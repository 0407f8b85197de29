//! Grid Builder: a dense, range-relative cell grid with merges resolved.
//!
//! After [`Grid::build`] every cell inside a merge region holds the value and
//! style of the region's top-left cell. Nothing downstream looks at merges
//! except through [`Grid::merge_bottom`].

use std::collections::HashMap;

use super::normalize::normalize;
use super::workbook::SheetSource;
use crate::types::{CellStyle, CellValue};

/// Inclusive merged block in absolute sheet coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRegion {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl MergeRegion {
    pub fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Self {
        Self {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    /// Parse an A1 range such as `"A1:B2"`.
    pub fn parse(range: &str) -> Option<Self> {
        let (start, end) = range.split_once(':')?;
        let (r0, c0) = parse_cell_ref(start)?;
        let (r1, c1) = parse_cell_ref(end)?;
        Some(Self::new(r0, c0, r1, c1))
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }
}

/// Parse an A1 cell reference (`"AB12"`, `"$C$3"`) into 0-based (row, col).
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut seen_letter = false;
    let mut seen_digit = false;

    for ch in cell_ref.chars().filter(|c| *c != '$') {
        if ch.is_ascii_alphabetic() && !seen_digit {
            col = col
                .checked_mul(26)?
                .checked_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
            seen_letter = true;
        } else if ch.is_ascii_digit() && seen_letter {
            row = row.checked_mul(10)?.checked_add(ch.to_digit(10)?)?;
            seen_digit = true;
        } else {
            return None;
        }
    }

    if !seen_digit || row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridCell {
    pub value: CellValue,
    pub style: Option<CellStyle>,
}

/// A merge clipped to the grid, in grid coordinates.
#[derive(Debug, Clone, Copy)]
struct GridMerge {
    region: MergeRegion,
    top: usize,
    left: usize,
    bottom: usize,
    right: usize,
}

static BLANK: GridCell = GridCell {
    value: CellValue::Blank,
    style: None,
};

#[derive(Debug, Clone, Default)]
pub struct Grid {
    origin_row: u32,
    origin_col: u32,
    cells: Vec<Vec<GridCell>>,
    merges: Vec<GridMerge>,
    merge_owner: HashMap<(usize, usize), usize>,
}

impl Grid {
    /// Materialize the used range of `source`, then apply its merges.
    pub fn build(source: &SheetSource) -> Self {
        let Some(range) = source.range else {
            return Self::default();
        };

        let mut cells = vec![vec![GridCell::default(); range.width()]; range.height()];
        for (&(row, col), value) in &source.values {
            if range.contains(row, col) {
                cells[(row - range.first_row) as usize][(col - range.first_col) as usize].value =
                    value.clone();
            }
        }
        for (&(row, col), style) in &source.styles {
            if range.contains(row, col) {
                cells[(row - range.first_row) as usize][(col - range.first_col) as usize].style =
                    Some(style.clone());
            }
        }

        let mut merges = Vec::new();
        for region in &source.merges {
            if region.last_row < range.first_row
                || region.first_row > range.last_row
                || region.last_col < range.first_col
                || region.first_col > range.last_col
            {
                continue;
            }
            merges.push(GridMerge {
                region: *region,
                top: (region.first_row.max(range.first_row) - range.first_row) as usize,
                left: (region.first_col.max(range.first_col) - range.first_col) as usize,
                bottom: (region.last_row.min(range.last_row) - range.first_row) as usize,
                right: (region.last_col.min(range.last_col) - range.first_col) as usize,
            });
        }

        let mut merge_owner = HashMap::new();
        for (idx, m) in merges.iter().enumerate() {
            for r in m.top..=m.bottom {
                for c in m.left..=m.right {
                    merge_owner.entry((r, c)).or_insert(idx);
                }
            }
        }

        let mut grid = Self {
            origin_row: range.first_row,
            origin_col: range.first_col,
            cells,
            merges,
            merge_owner,
        };
        grid.apply_merges(source);
        grid
    }

    /// Copy each merge's top-left value and style over the whole region.
    ///
    /// The top-left cell is read from `source`, so re-applying is a no-op.
    pub fn apply_merges(&mut self, source: &SheetSource) {
        for m in &self.merges {
            let anchor = GridCell {
                value: source
                    .value(m.region.first_row, m.region.first_col)
                    .cloned()
                    .unwrap_or_default(),
                style: source
                    .style(m.region.first_row, m.region.first_col)
                    .cloned(),
            };
            for row in &mut self.cells[m.top..=m.bottom] {
                for cell in &mut row[m.left..=m.right] {
                    *cell = anchor.clone();
                }
            }
        }
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn width(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Absolute sheet row of grid row `row`.
    pub fn sheet_row(&self, row: usize) -> usize {
        self.origin_row as usize + row
    }

    pub fn sheet_col(&self, col: usize) -> usize {
        self.origin_col as usize + col
    }

    pub fn cell(&self, row: usize, col: usize) -> &GridCell {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&BLANK)
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        &self.cell(row, col).value
    }

    pub fn style(&self, row: usize, col: usize) -> Option<&CellStyle> {
        self.cell(row, col).style.as_ref()
    }

    pub fn text(&self, row: usize, col: usize) -> String {
        self.value(row, col).as_text()
    }

    pub fn normalized(&self, row: usize, col: usize) -> String {
        normalize(&self.text(row, col))
    }

    /// Bottom grid row of the merge covering (row, col), or `row` itself.
    pub fn merge_bottom(&self, row: usize, col: usize) -> usize {
        self.merge_owner
            .get(&(row, col))
            .map_or(row, |&idx| self.merges[idx].bottom)
    }

    pub fn row_is_blank(&self, row: usize) -> bool {
        (0..self.width()).all(|c| self.value(row, c).is_blank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged_header_sheet() -> SheetSource {
        let mut sheet = SheetSource::from_rows(
            "Sheet1",
            &[
                &["STT", "Chỉ tiêu", "Năm 2024", ""],
                &["", "", "Kế hoạch", "Thực hiện"],
                &["1", "Doanh thu", "100", "95"],
            ],
        );
        sheet.set_style(0, 0, CellStyle::italic());
        sheet.add_merge(MergeRegion::parse("A1:A2").unwrap());
        sheet.add_merge(MergeRegion::parse("B1:B2").unwrap());
        sheet.add_merge(MergeRegion::parse("C1:D1").unwrap());
        sheet
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B2"), Some((1, 1)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("$C$3"), Some((2, 2)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A1B"), None);
    }

    #[test]
    fn test_merge_region_parse() {
        let m = MergeRegion::parse("B3:D4").unwrap();
        assert_eq!(m, MergeRegion::new(2, 1, 3, 3));
        assert!(m.contains(3, 2));
        assert!(!m.contains(4, 2));
        assert!(MergeRegion::parse("B3").is_none());
    }

    #[test]
    fn test_build_expands_merges() {
        let sheet = merged_header_sheet();
        let grid = Grid::build(&sheet);

        assert_eq!(grid.height(), 3);
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.text(1, 0), "STT");
        assert_eq!(grid.text(1, 1), "Chỉ tiêu");
        assert_eq!(grid.text(0, 3), "Năm 2024");
        assert_eq!(grid.style(1, 0), Some(&CellStyle::italic()));
        assert_eq!(grid.text(1, 2), "Kế hoạch");
    }

    #[test]
    fn test_merge_invariant_and_idempotence() {
        let sheet = merged_header_sheet();
        let mut grid = Grid::build(&sheet);

        let check = |grid: &Grid| {
            for m in &sheet.merges {
                let anchor = grid.cell(m.first_row as usize, m.first_col as usize).clone();
                for r in m.first_row..=m.last_row {
                    for c in m.first_col..=m.last_col {
                        assert_eq!(grid.cell(r as usize, c as usize), &anchor);
                    }
                }
            }
        };
        check(&grid);
        let before: Vec<GridCell> = (0..grid.height())
            .flat_map(|r| (0..grid.width()).map(move |c| (r, c)))
            .map(|(r, c)| grid.cell(r, c).clone())
            .collect();

        grid.apply_merges(&sheet);
        check(&grid);
        let after: Vec<GridCell> = (0..grid.height())
            .flat_map(|r| (0..grid.width()).map(move |c| (r, c)))
            .map(|(r, c)| grid.cell(r, c).clone())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_merge_bottom() {
        let grid = Grid::build(&merged_header_sheet());
        assert_eq!(grid.merge_bottom(0, 0), 1);
        assert_eq!(grid.merge_bottom(0, 1), 1);
        assert_eq!(grid.merge_bottom(0, 2), 0);
        assert_eq!(grid.merge_bottom(2, 0), 2);
    }

    #[test]
    fn test_range_offset_is_normalized() {
        let mut sheet = SheetSource::new("S");
        sheet.set_value(3, 2, CellValue::from("STT"));
        sheet.set_value(4, 3, CellValue::from("x"));
        sheet.add_merge(MergeRegion::parse("C4:C5").unwrap());

        let grid = Grid::build(&sheet);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 2);
        assert_eq!(grid.text(0, 0), "STT");
        assert_eq!(grid.text(1, 0), "STT");
        assert_eq!(grid.sheet_row(1), 4);
        assert_eq!(grid.sheet_col(1), 3);
    }

    #[test]
    fn test_merge_outside_range_is_ignored() {
        let mut sheet = SheetSource::from_rows("S", &[&["a", "b"]]);
        sheet.add_merge(MergeRegion::parse("E5:F6").unwrap());
        let grid = Grid::build(&sheet);
        assert_eq!(grid.text(0, 0), "a");
        assert_eq!(grid.text(0, 1), "b");
    }

    #[test]
    fn test_empty_source_gives_empty_grid() {
        let grid = Grid::build(&SheetSource::new("S"));
        assert!(grid.is_empty());
        assert_eq!(grid.text(5, 5), "");
    }
}
