/// Lowercased alphanumeric tokens
pub(crate) fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Whitespace- and case-insensitive form used to spot duplicates
pub(crate) fn normalize(text: &str) -> String {
    tokens(text).join(" ")
}
