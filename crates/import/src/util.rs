/// Returns the first needle contained in `haystack`, ignoring case.
/// Needles are compared lower-cased, so callers may pass them in any case.
pub fn find_ci<'a, S: AsRef<str>>(haystack: &str, needles: &'a [S]) -> Option<&'a str> {
    let lower = haystack.to_lowercase();
    needles
        .iter()
        .map(AsRef::as_ref)
        .find(|n| !n.trim().is_empty() && lower.contains(&n.to_lowercase()))
}

/// Character count ignoring line breaks.
pub fn flat_len(text: &str) -> usize {
    text.chars().filter(|c| *c != '\n' && *c != '\r').count()
}

/// A line made of exactly one punctuation or symbol character, e.g. a dangling
/// `-`, `•` or `—` left behind after a label was stripped.
pub fn is_lone_punctuation(line: &str) -> bool {
    let mut chars = line.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
    )
}
