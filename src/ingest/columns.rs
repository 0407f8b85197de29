//! Column Role Resolver: output width and the planned/actual columns.

use super::grid::Grid;
use super::header::HeaderVocabulary;
use super::normalize::{contains_any, normalize};

/// Width for strict headers: the right-most non-blank column seen on the
/// header row or any row below it.
pub fn strict_width(grid: &Grid, header_row: usize) -> usize {
    let mut last = 0;
    for r in header_row..grid.height() {
        if let Some(c) = (0..grid.width()).rev().find(|&c| !grid.value(r, c).is_blank()) {
            last = last.max(c);
        }
    }
    (last + 1).min(grid.width())
}

/// Header text for columns `0..width` of `header_row`.
pub fn header_texts(grid: &Grid, header_row: usize, width: usize) -> Vec<String> {
    (0..width).map(|c| grid.text(header_row, c)).collect()
}

/// Planned ("Kế hoạch") and actual ("Thực hiện") column indices, by substring
/// match over the final header list. Expects a normalized vocabulary.
pub fn resolve_value_columns(
    headers: &[String],
    vocabulary: &HeaderVocabulary,
) -> (Option<usize>, Option<usize>) {
    let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
    let find = |phrases: &[String]| normalized.iter().position(|h| contains_any(h, phrases));
    (find(&vocabulary.planned), find(&vocabulary.actual))
}
