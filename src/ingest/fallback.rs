//! Fallback Full-Sheet Reader, used when no header row is found.

use super::grid::Grid;
use crate::types::TableCell;

/// Row 0 verbatim as headers; every non-blank later row as data, never input.
pub fn read_full_sheet(grid: &Grid) -> (Vec<String>, Vec<Vec<TableCell>>) {
    if grid.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let headers = (0..grid.width()).map(|c| grid.text(0, c)).collect();
    let rows = (1..grid.height())
        .filter(|&r| !grid.row_is_blank(r))
        .map(|r| {
            (0..grid.width())
                .map(|c| TableCell::fixed(grid.value(r, c).clone()))
                .collect()
        })
        .collect();
    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::workbook::SheetSource;
    use crate::types::CellStyle;

    #[test]
    fn test_full_sheet() {
        let mut sheet = SheetSource::from_rows(
            "S",
            &[
                &["Name", "Value", ""],
                &["a", "1", ""],
                &["", " ", ""],
                &["b", "", "z"],
            ],
        );
        sheet.set_style(1, 1, CellStyle::solid_fill());
        let grid = Grid::build(&sheet);
        let (headers, rows) = read_full_sheet(&grid);

        assert_eq!(headers, vec!["Name", "Value", ""]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == headers.len()));
        assert!(rows.iter().flatten().all(|cell| !cell.is_input));
    }

    #[test]
    fn test_empty_grid() {
        let (headers, rows) = read_full_sheet(&Grid::default());
        assert!(headers.is_empty());
        assert!(rows.is_empty());
    }
}
