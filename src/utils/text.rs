//! Text helpers shared by the catalog loader and the matchers.

/// Split text into lower-cased alphanumeric tokens.
///
/// Any non-alphanumeric character is a separator, so `cardiac_arrest`,
/// `Cardiac Arrest` and `cardiac-arrest` all tokenize the same way.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Canonical form of a category tag: trimmed and lower-cased
#[must_use]
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// Truncate to at most `max_chars` characters, appending "..." when cut.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars).collect();
        format!("{}...", kept.trim_end())
    }
}
