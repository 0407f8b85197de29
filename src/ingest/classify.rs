//! Input-Cell Classifier.
//!
//! Exactly one [`InputPolicy`] is active per deployment. The two policies read
//! different style signals and are never mixed or switched from file contents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::grid::Grid;
use crate::types::ColumnRoles;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InputPolicy {
    /// An italic label cell marks the row's planned and actual cells as input.
    #[default]
    ItalicLabel,
    /// A cell with its own fill is input, optionally only in planned/actual columns.
    FillColor { restrict_to_planned_actual: bool },
}

impl InputPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            InputPolicy::ItalicLabel => "italic-label",
            InputPolicy::FillColor {
                restrict_to_planned_actual: false,
            } => "fill-color",
            InputPolicy::FillColor {
                restrict_to_planned_actual: true,
            } => "fill-color-restricted",
        }
    }

    /// `isInput` for columns `0..width` of grid row `row`.
    pub fn classify_row(
        &self,
        grid: &Grid,
        row: usize,
        width: usize,
        roles: &ColumnRoles,
    ) -> Vec<bool> {
        let is_value_column = |c: usize| roles.planned == Some(c) || roles.actual == Some(c);
        match *self {
            InputPolicy::ItalicLabel => {
                let italic = roles
                    .label
                    .and_then(|c| grid.style(row, c))
                    .is_some_and(|style| style.font.italic);
                (0..width).map(|c| italic && is_value_column(c)).collect()
            }
            InputPolicy::FillColor {
                restrict_to_planned_actual,
            } => (0..width)
                .map(|c| {
                    let filled = grid.style(row, c).is_some_and(|style| style.is_filled());
                    filled && (!restrict_to_planned_actual || is_value_column(c))
                })
                .collect(),
        }
    }
}

impl fmt::Display for InputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "italic-label" | "italic" => Ok(InputPolicy::ItalicLabel),
            "fill-color" | "fill" => Ok(InputPolicy::FillColor {
                restrict_to_planned_actual: false,
            }),
            "fill-color-restricted" => Ok(InputPolicy::FillColor {
                restrict_to_planned_actual: true,
            }),
            other => Err(format!(
                "unknown input policy '{}' (expected italic-label, fill-color or fill-color-restricted)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::workbook::SheetSource;
    use crate::types::CellStyle;

    fn roles() -> ColumnRoles {
        ColumnRoles {
            sequence: Some(0),
            label: Some(1),
            planned: Some(2),
            actual: Some(3),
            reference_score: None,
        }
    }

    fn sheet() -> SheetSource {
        let mut sheet = SheetSource::from_rows(
            "S",
            &[
                &["STT", "Chỉ tiêu", "Kế hoạch", "Thực hiện", "Ghi chú"],
                &["1", "a", "", "", ""],
                &["2", "b", "", "", "x"],
            ],
        );
        sheet.set_style(1, 1, CellStyle::italic());
        sheet.set_style(2, 3, CellStyle::solid_fill());
        sheet.set_style(2, 4, CellStyle::solid_fill());
        sheet
    }

    #[test]
    fn test_italic_label_marks_planned_and_actual() {
        let grid = crate::ingest::grid::Grid::build(&sheet());
        let policy = InputPolicy::ItalicLabel;
        assert_eq!(
            policy.classify_row(&grid, 1, 5, &roles()),
            vec![false, false, true, true, false]
        );
        assert_eq!(policy.classify_row(&grid, 2, 5, &roles()), vec![false; 5]);
    }

    #[test]
    fn test_italic_label_without_value_columns() {
        let grid = crate::ingest::grid::Grid::build(&sheet());
        let roles = ColumnRoles {
            planned: None,
            actual: None,
            ..roles()
        };
        assert_eq!(
            InputPolicy::ItalicLabel.classify_row(&grid, 1, 5, &roles),
            vec![false; 5]
        );
    }

    #[test]
    fn test_fill_color_uses_each_cell() {
        let grid = crate::ingest::grid::Grid::build(&sheet());
        let open = InputPolicy::FillColor {
            restrict_to_planned_actual: false,
        };
        assert_eq!(
            open.classify_row(&grid, 2, 5, &roles()),
            vec![false, false, false, true, true]
        );
        assert_eq!(open.classify_row(&grid, 1, 5, &roles()), vec![false; 5]);

        let restricted = InputPolicy::FillColor {
            restrict_to_planned_actual: true,
        };
        assert_eq!(
            restricted.classify_row(&grid, 2, 5, &roles()),
            vec![false, false, false, true, false]
        );
    }

    #[test]
    fn test_policy_names_round_trip() {
        for policy in [
            InputPolicy::ItalicLabel,
            InputPolicy::FillColor {
                restrict_to_planned_actual: false,
            },
            InputPolicy::FillColor {
                restrict_to_planned_actual: true,
            },
        ] {
            assert_eq!(policy.name().parse::<InputPolicy>(), Ok(policy));
        }
        assert!("bold".parse::<InputPolicy>().is_err());
    }

    #[test]
    fn test_default_policy_is_italic_label() {
        assert_eq!(InputPolicy::default(), InputPolicy::ItalicLabel);
        assert_eq!(InputPolicy::default().name(), "italic-label");
    }
}
