/// Shortens `value` to at most `limit` characters, marking the cut with `…`.
pub fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut out: String = value.chars().take(limit - 1).collect();
    out.push('…');
    out
}

/// Returns the trimmed string when it has any content.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}
