//! Row Extractor & Terminator.

use super::classify::InputPolicy;
use super::grid::Grid;
use crate::types::{ColumnRoles, TableCell};

/// Sequence value that ends extraction. Its own row is still emitted.
pub const SENTINEL: &str = "D";

/// Emit data rows below `header_row`.
///
/// Rows with a blank sequence cell are skipped. Extraction stops after the
/// first row whose sequence cell is exactly `D` (any case).
pub fn extract_rows(
    grid: &Grid,
    header_row: usize,
    width: usize,
    roles: &ColumnRoles,
    policy: InputPolicy,
) -> Vec<Vec<TableCell>> {
    let sequence_col = roles.sequence.unwrap_or(0);
    let mut rows = Vec::new();

    for r in (header_row + 1)..grid.height() {
        let sequence = grid.text(r, sequence_col).trim().to_uppercase();
        if sequence.is_empty() {
            continue;
        }

        let inputs = policy.classify_row(grid, r, width, roles);
        rows.push(
            inputs
                .into_iter()
                .enumerate()
                .map(|(c, is_input)| TableCell {
                    value: grid.value(r, c).clone(),
                    is_input,
                })
                .collect(),
        );

        if sequence == SENTINEL {
            break;
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::workbook::SheetSource;
    use crate::types::CellValue;

    fn roles() -> ColumnRoles {
        ColumnRoles {
            sequence: Some(0),
            label: Some(1),
            planned: Some(2),
            actual: Some(3),
            reference_score: None,
        }
    }

    fn sequences(rows: &[Vec<TableCell>]) -> Vec<String> {
        rows.iter().map(|r| r[0].value.as_text()).collect()
    }

    #[test]
    fn test_skips_blank_sequence_rows() {
        let sheet = SheetSource::from_rows(
            "S",
            &[
                &["STT", "Chỉ tiêu", "Kế hoạch", "Thực hiện"],
                &["", "group title", "", ""],
                &["1", "a", "1", "2"],
                &["  ", "b", "", ""],
                &["2", "c", "3", "4"],
            ],
        );
        let grid = Grid::build(&sheet);
        let rows = extract_rows(&grid, 0, 4, &roles(), InputPolicy::ItalicLabel);
        assert_eq!(sequences(&rows), vec!["1", "2"]);
    }

    #[test]
    fn test_sentinel_is_inclusive_and_terminal() {
        let sheet = SheetSource::from_rows(
            "S",
            &[
                &["STT", "Chỉ tiêu"],
                &["1", "a"],
                &["d", "end"],
                &["3", "after"],
            ],
        );
        let grid = Grid::build(&sheet);
        let rows = extract_rows(&grid, 0, 2, &roles(), InputPolicy::ItalicLabel);
        assert_eq!(sequences(&rows), vec!["1", "d"]);
    }

    #[test]
    fn test_sentinel_is_exact_match() {
        let sheet = SheetSource::from_rows(
            "S",
            &[
                &["STT", "Chỉ tiêu"],
                &["D1", "a"],
                &["DD", "b"],
                &[" D ", "c"],
                &["4", "after"],
            ],
        );
        let grid = Grid::build(&sheet);
        let rows = extract_rows(&grid, 0, 2, &roles(), InputPolicy::ItalicLabel);
        assert_eq!(sequences(&rows), vec!["D1", "DD", " D "]);
    }

    #[test]
    fn test_row_width_matches_requested_width() {
        let sheet = SheetSource::from_rows(
            "S",
            &[&["STT", "Chỉ tiêu", "x", "y"], &["1", "a", "1", "2"]],
        );
        let grid = Grid::build(&sheet);
        let rows = extract_rows(&grid, 0, 3, &roles(), InputPolicy::ItalicLabel);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[0][2].value, CellValue::Text("1".to_string()));
    }
}
