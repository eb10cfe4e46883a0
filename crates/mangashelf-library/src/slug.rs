//! Deterministic conversion of display names into directory names.

/// Convert a display name into a filesystem-safe path segment.
///
/// The first character is lower-cased, every character other than ASCII
/// alphanumerics, `-`, `.`, `(` and `)` is dropped, and each remaining
/// upper-case letter becomes `-` followed by its lower-case form.
/// Normalised output is a fixed point.
///
/// ```
/// use mangashelf_library::slug::normalize;
///
/// assert_eq!(normalize("One Piece"), "one-piece");
/// assert_eq!(normalize("one-piece"), "one-piece");
/// ```
#[must_use]
pub fn normalize(input: &str) -> String {
    let mut chars = input.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut normalized = String::with_capacity(input.len() + 4);
    for ch in first.to_lowercase().chain(chars) {
        if !is_allowed(ch) {
            continue;
        }
        if ch.is_ascii_uppercase() {
            normalized.push('-');
            normalized.push(ch.to_ascii_lowercase());
        } else {
            normalized.push(ch);
        }
    }
    normalized
}

const fn is_allowed(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '(' | ')')
}
