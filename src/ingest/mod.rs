//! Spreadsheet ingestion: workbook bytes → [`ParsedTable`].
//!
//! Pipeline: [`workbook`] decodes the first sheet, [`grid`] resolves merges,
//! [`header`] finds the header row, [`columns`] fixes the output width and the
//! planned/actual columns, then [`extract`] and [`classify`] emit rows. When no
//! header is found, [`fallback`] reads the whole sheet.

pub mod classify;
pub mod columns;
pub mod extract;
pub mod fallback;
pub mod grid;
pub mod header;
pub mod normalize;
pub mod styles;
pub mod workbook;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub use classify::InputPolicy;
pub use grid::{Grid, MergeRegion};
pub use header::{FlexibleRole, HeaderLocator, HeaderMatch, HeaderVocabulary};
pub use workbook::{SheetSource, DEFAULT_MAX_CELLS};

use crate::error::FormResult;
use crate::types::{ParseMeta, ParseMode, ParsedTable};

/// Message placed in `meta.message` when the workbook has no sheet.
pub const NO_SHEET_MESSAGE: &str = "Sheet does not exist";

/// Knobs fixed per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestOptions {
    pub vocabulary: HeaderVocabulary,
    pub flexible_role: FlexibleRole,
    pub input_policy: InputPolicy,
    /// Upper bound on a sheet's used range, in cells.
    pub max_cells: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            vocabulary: HeaderVocabulary::default(),
            flexible_role: FlexibleRole::default(),
            input_policy: InputPolicy::default(),
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

pub struct TemplateParser {
    locator: HeaderLocator,
    vocabulary: HeaderVocabulary,
    policy: InputPolicy,
    max_cells: usize,
}

impl TemplateParser {
    pub fn new(options: &IngestOptions) -> Self {
        Self {
            locator: HeaderLocator::new(&options.vocabulary, options.flexible_role),
            vocabulary: options.vocabulary.normalized(),
            policy: options.input_policy,
            max_cells: options.max_cells,
        }
    }

    pub fn policy(&self) -> InputPolicy {
        self.policy
    }

    /// Parse an in-memory workbook.
    ///
    /// Decoding failures and oversized sheets are errors; a workbook without
    /// sheets yields an `error`-mode table with no rows.
    pub fn parse_bytes(&self, bytes: &[u8]) -> FormResult<ParsedTable> {
        match workbook::read_first_sheet(bytes, self.max_cells)? {
            Some(sheet) => Ok(self.parse_sheet(&sheet)),
            None => Ok(ParsedTable::error(NO_SHEET_MESSAGE)),
        }
    }

    pub fn parse_path(&self, path: impl AsRef<Path>) -> FormResult<ParsedTable> {
        let bytes = std::fs::read(path.as_ref())?;
        self.parse_bytes(&bytes)
    }

    pub fn parse_sheet(&self, sheet: &SheetSource) -> ParsedTable {
        let grid = Grid::build(sheet);

        let Some(found) = self.locator.locate(&grid) else {
            debug!(sheet = %sheet.name, "no header row, reading full sheet");
            let (headers, rows) = fallback::read_full_sheet(&grid);
            return ParsedTable {
                headers,
                rows,
                meta: ParseMeta {
                    mode: ParseMode::FullSheet,
                    header_row: None,
                    columns: None,
                    input_policy: "none".to_string(),
                    sheet_name: Some(sheet.name.clone()),
                    message: None,
                },
            };
        };

        let width = match found.mode {
            ParseMode::Strict => columns::strict_width(&grid, found.header_row),
            _ => grid.width(),
        };
        let headers = columns::header_texts(&grid, found.header_row, width);

        let mut roles = found.roles;
        let (planned, actual) = columns::resolve_value_columns(&headers, &self.vocabulary);
        roles.planned = planned;
        roles.actual = actual;

        let rows = extract::extract_rows(&grid, found.header_row, width, &roles, self.policy);
        debug!(
            sheet = %sheet.name,
            mode = %found.mode,
            columns = width,
            rows = rows.len(),
            "sheet parsed"
        );

        ParsedTable {
            headers,
            rows,
            meta: ParseMeta {
                mode: found.mode,
                header_row: Some(grid.sheet_row(found.header_row)),
                columns: Some(roles),
                input_policy: self.policy.name().to_string(),
                sheet_name: Some(sheet.name.clone()),
                message: None,
            },
        }
    }
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new(&IngestOptions::default())
    }
}
