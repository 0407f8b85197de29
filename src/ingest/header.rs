//! Header Locator: find the row that names the form's columns.
//!
//! Two strategies run in order, first match wins:
//! - strict: column 0 is exactly a sequence phrase and column 1 holds a label phrase;
//! - flexible: sequence, label and a third role appear anywhere on one row.
//!
//! Either way the effective header row moves down to the bottom of any
//! vertical merge covering the matched cells.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::grid::Grid;
use super::normalize::{contains_any, normalize};
use crate::error::FormResult;
use crate::types::{ColumnRoles, ParseMode};

/// Target phrases per semantic role. Accented and plain spellings are both fine;
/// every phrase is normalized before matching. Roles missing from a YAML file
/// keep their built-in phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderVocabulary {
    pub sequence: Vec<String>,
    pub label: Vec<String>,
    pub planned: Vec<String>,
    pub actual: Vec<String>,
    pub reference_score: Vec<String>,
}

impl Default for HeaderVocabulary {
    fn default() -> Self {
        let phrases =
            |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            sequence: phrases(&["stt"]),
            label: phrases(&["chi tieu", "chỉ tiêu"]),
            planned: phrases(&["ke hoach", "kế hoạch"]),
            actual: phrases(&["thuc hien", "thực hiện"]),
            reference_score: phrases(&["diem chuan", "điểm chuẩn"]),
        }
    }
}

impl HeaderVocabulary {
    pub fn load(path: impl AsRef<Path>) -> FormResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> FormResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Copy with every phrase normalized and deduplicated.
    pub fn normalized(&self) -> Self {
        let fold = |list: &[String]| {
            let mut out: Vec<String> = Vec::new();
            for phrase in list.iter().map(|p| normalize(p)) {
                if !phrase.is_empty() && !out.contains(&phrase) {
                    out.push(phrase);
                }
            }
            out
        };
        Self {
            sequence: fold(&self.sequence),
            label: fold(&self.label),
            planned: fold(&self.planned),
            actual: fold(&self.actual),
            reference_score: fold(&self.reference_score),
        }
    }
}

/// Third role the flexible strategy requires next to sequence and label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FlexibleRole {
    /// A standalone "Điểm chuẩn" column.
    #[default]
    ReferenceScore,
    /// A "Kế hoạch" or "Thực hiện" column.
    PlannedActual,
}

/// A located header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    pub mode: ParseMode,
    /// Grid row whose text matched.
    pub matched_row: usize,
    /// Grid row treated as the header after merge adjustment.
    pub header_row: usize,
    pub roles: ColumnRoles,
}

pub struct HeaderLocator {
    vocabulary: HeaderVocabulary,
    flexible_role: FlexibleRole,
}

impl HeaderLocator {
    pub fn new(vocabulary: &HeaderVocabulary, flexible_role: FlexibleRole) -> Self {
        Self {
            vocabulary: vocabulary.normalized(),
            flexible_role,
        }
    }

    pub fn locate(&self, grid: &Grid) -> Option<HeaderMatch> {
        let found = self.locate_strict(grid).or_else(|| self.locate_flexible(grid));
        if let Some(m) = &found {
            debug!(
                mode = %m.mode,
                matched_row = m.matched_row,
                header_row = m.header_row,
                "header located"
            );
        }
        found
    }

    pub fn locate_strict(&self, grid: &Grid) -> Option<HeaderMatch> {
        if grid.width() < 2 {
            return None;
        }
        (0..grid.height()).find_map(|r| {
            let c0 = grid.normalized(r, 0);
            let c1 = grid.normalized(r, 1);
            let sequence_ok = self.vocabulary.sequence.iter().any(|p| *p == c0);
            if !sequence_ok || !contains_any(&c1, &self.vocabulary.label) {
                return None;
            }
            Some(HeaderMatch {
                mode: ParseMode::Strict,
                matched_row: r,
                header_row: grid.merge_bottom(r, 0).max(grid.merge_bottom(r, 1)),
                roles: ColumnRoles {
                    sequence: Some(0),
                    label: Some(1),
                    ..ColumnRoles::default()
                },
            })
        })
    }

    pub fn locate_flexible(&self, grid: &Grid) -> Option<HeaderMatch> {
        (0..grid.height()).find_map(|r| {
            let roles = self.scan_row(grid, r);
            let third_role = match self.flexible_role {
                FlexibleRole::ReferenceScore => roles.reference_score.is_some(),
                FlexibleRole::PlannedActual => roles.planned.is_some() || roles.actual.is_some(),
            };
            if roles.sequence.is_none() || roles.label.is_none() || !third_role {
                return None;
            }

            let matched_columns = match self.flexible_role {
                FlexibleRole::ReferenceScore => {
                    vec![roles.sequence, roles.label, roles.reference_score]
                }
                FlexibleRole::PlannedActual => {
                    vec![roles.sequence, roles.label, roles.planned, roles.actual]
                }
            };
            let header_row = matched_columns
                .into_iter()
                .flatten()
                .map(|c| grid.merge_bottom(r, c))
                .max()
                .unwrap_or(r);

            Some(HeaderMatch {
                mode: ParseMode::Flexible,
                matched_row: r,
                header_row,
                roles,
            })
        })
    }

    /// First column (left to right) containing each role's phrase on row `r`.
    fn scan_row(&self, grid: &Grid, r: usize) -> ColumnRoles {
        let mut roles = ColumnRoles::default();
        for c in 0..grid.width() {
            let text = grid.normalized(r, c);
            if text.is_empty() {
                continue;
            }
            let v = &self.vocabulary;
            for (slot, phrases) in [
                (&mut roles.sequence, &v.sequence),
                (&mut roles.label, &v.label),
                (&mut roles.planned, &v.planned),
                (&mut roles.actual, &v.actual),
                (&mut roles.reference_score, &v.reference_score),
            ] {
                if slot.is_none() && contains_any(&text, phrases) {
                    *slot = Some(c);
                }
            }
        }
        roles
    }
}
