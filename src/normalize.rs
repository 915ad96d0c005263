//! String normalization shared by import and grading.
//!
//! Every comparison in this crate runs both sides through the same rule:
//! German text is whitespace-collapsed and lowercased, Japanese text is
//! whitespace-collapsed only (case folding does not apply to the script).

/// Collapse internal whitespace runs to a single space and trim the ends.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalization rule for German text: collapse whitespace, trim, lowercase.
pub fn normalize_german(value: &str) -> String {
    normalize_whitespace(value).to_lowercase()
}

/// Normalization rule for Japanese text: collapse whitespace and trim only.
pub fn normalize_japanese(value: &str) -> String {
    normalize_whitespace(value)
}
