//! Pure string utility functions

use crate::constants::TRUNCATE_SUFFIX;

/// Truncate `text` to at most `max_chars` characters, ending with `...`
/// when anything was cut.
///
/// Works on characters, not bytes, so multi-byte input never splits.
///
/// ```
/// use flowsync_domain::utils::text::truncate_with_suffix;
///
/// assert_eq!(truncate_with_suffix("short", 10), "short");
/// assert_eq!(truncate_with_suffix("abcdefghij", 8), "abcde...");
/// ```
#[must_use]
pub fn truncate_with_suffix(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATE_SUFFIX.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATE_SUFFIX);
    truncated
}

/// Case-insensitive containment in either direction.
#[must_use]
pub fn names_overlap(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}
