//! Diacritic-insensitive text folding used for every header comparison.

use unicode_normalization::UnicodeNormalization;

/// Fold `s` for comparison: lowercase, decompose, drop combining marks, trim.
///
/// `đ` has no canonical decomposition, so it is folded to `d` explicitly.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// True if the normalized `text` contains any of the (normalized) `phrases`.
pub fn contains_any(text: &str, phrases: &[String]) -> bool {
    !text.is_empty() && phrases.iter().any(|p| !p.is_empty() && text.contains(p.as_str()))
}
