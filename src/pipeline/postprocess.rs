//! Post-processing: deterministic cleanup of generated section bodies.
//!
//! Chat models occasionally wrap their reply in code fences, repeat the
//! heading they were given, or emit `\r\n` line endings. The article layout
//! already prints the heading on its own line, so an echoed heading would
//! appear twice.
//!
//! ## Rule Order
//!
//! Normalise line endings before trimming, strip fences before looking for
//! an echoed heading, and trim the outer whitespace last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one generated body.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer code fences
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Drop a first line that only repeats `heading`
/// 6. Collapse 2+ consecutive blank lines down to 1
/// 7. Trim leading and trailing blank space
pub fn clean_section(input: &str, heading: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fences(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = strip_echoed_heading(&s, heading);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Strip an echoed heading ──────────────────────────────────────────
//
// Matches the heading alone on the first non-blank line, optionally dressed
// as a markdown heading (`## Intro`), bold (`**Intro**`) or a label
// (`Intro:`). Comparison is case-insensitive.

static RE_HEADING_DRESSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#{0,6}\s*(?:\*\*|__)?\s*(.*?)\s*(?:\*\*|__)?\s*:?\s*$").unwrap());

fn strip_echoed_heading(input: &str, heading: &str) -> String {
    let wanted = heading.trim();
    if wanted.is_empty() {
        return input.to_string();
    }
    let body = input.trim_start_matches('\n');
    let (first, rest) = body.split_once('\n').unwrap_or((body, ""));
    let echoed = RE_HEADING_DRESSING
        .captures(first)
        .map(|caps| caps[1].eq_ignore_ascii_case(wanted))
        .unwrap_or(false);
    if echoed {
        rest.to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_outer_fences("```markdown\nHello\nWorld\n```"), "Hello\nWorld");
        assert_eq!(strip_outer_fences("```\nHello\n```"), "Hello");
    }

    #[test]
    fn test_inner_fences_untouched() {
        let input = "Intro text\n```\ncode\n```\nOutro";
        assert_eq!(strip_outer_fences(input), input);
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hello   \nworld  "), "  hello\nworld");
    }

    #[test]
    fn test_strip_echoed_heading_variants() {
        for first in ["Benefits", "## Benefits", "**Benefits**", "Benefits:", "# benefits"] {
            let input = format!("{first}\nSolar saves money.");
            assert_eq!(
                strip_echoed_heading(&input, "Benefits"),
                "Solar saves money.",
                "first line: {first:?}"
            );
        }
    }

    #[test]
    fn test_heading_mentioned_in_sentence_kept() {
        let input = "Benefits are many.\nMore text.";
        assert_eq!(strip_echoed_heading(input, "Benefits"), input);
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_section_full_pipeline() {
        let input = "```markdown\r\n## Intro\r\n\r\nI **love** the sun.   \r\n\r\n\r\n\r\nDo you?\r\n```";
        assert_eq!(clean_section(input, "Intro"), "I **love** the sun.\n\nDo you?");
    }

    #[test]
    fn test_clean_section_empty() {
        assert_eq!(clean_section("", "Intro"), "");
        assert_eq!(clean_section("Intro", "Intro"), "");
    }
}
