//! Heading list parsing and per-section token budgets.

/// Split a comma-separated heading string into trimmed, non-empty headings.
///
/// Order is preserved and duplicates are kept. Blank input, and blank
/// segments such as the middle of `"a,,b"`, produce no heading.
pub fn parse_headings(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

/// Share of `article_length` allotted to each of `heading_count` sections.
///
/// Integer division; `None` when there are no headings.
pub fn token_budget(article_length: usize, heading_count: usize) -> Option<usize> {
    article_length.checked_div(heading_count)
}
