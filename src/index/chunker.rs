//! Split ingested text into overlapping chunks for embedding.

/// Split `text` into chunks of at most `max_chars` characters, each sharing
/// `overlap` characters with the previous one.
///
/// The overlap is capped at half of each emitted chunk, so every step moves
/// forward by at least half a chunk and the count stays linear in
/// `len / max_chars`.
///
/// Breaks prefer a paragraph boundary, then a sentence end, then whitespace,
/// searched in the back half of the window. Character (not byte) counts are
/// used so multi-byte text never splits inside a code point.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let overlap = overlap.min(max_chars.saturating_sub(1));
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + max_chars).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars, start + max_chars / 2, hard_end).unwrap_or(hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end == chars.len() {
            break;
        }
        let step_back = overlap.min((end - start) / 2);
        start = (end - step_back).max(start + 1);
    }

    chunks
}

/// Best break position in `chars[from..to]`, returned as an exclusive end.
fn find_break(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let window = from..to;

    let paragraph = window
        .clone()
        .rev()
        .find(|&i| i > 0 && chars[i] == '\n' && chars[i - 1] == '\n');
    if let Some(i) = paragraph {
        return Some(i + 1);
    }

    let sentence = window.clone().rev().find(|&i| {
        matches!(chars[i], '.' | '!' | '?') && chars.get(i + 1).is_some_and(|c| c.is_whitespace())
    });
    if let Some(i) = sentence {
        return Some(i + 1);
    }

    window.rev().find(|&i| chars[i].is_whitespace()).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   \n ", 100, 10).is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(chunk_text("  hello world ", 100, 10), vec!["hello world"]);
    }

    #[test]
    fn long_text_is_split_with_bounded_size() {
        let sentence = "Solar panels convert light into electricity. ";
        let text = sentence.repeat(40);
        let chunks = chunk_text(&text, 200, 40);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 200, "chunk too long: {}", c.len());
        }
        // Sentence breaks are preferred.
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = (0..300).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, 100, 30);
        let last_word_of_first = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn large_overlap_still_advances_by_half_a_chunk() {
        let text = "word ".repeat(2000);
        let chunks = chunk_text(&text, 64, 63);
        // Each step moves at least a quarter of the window forward.
        assert!(chunks.len() <= 4 * text.len() / 64 + 1, "got {}", chunks.len());
        assert!(chunks.iter().all(|c| c.chars().count() <= 64));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "é".repeat(1000);
        let chunks = chunk_text(&text, 64, 8);
        assert!(chunks.iter().all(|c| c.chars().count() <= 64));
    }
}
