//! Prompt text for section generation and index query synthesis.
//!
//! Callers can override the writing guidelines via
//! [`crate::config::GenerationConfig::guidelines`]; the constants here are
//! used only when no override is provided.

/// Default writing guidelines appended to every section prompt.
pub const DEFAULT_GUIDELINES: &str = r#"Guidelines

Introduction:
- The intro should ALWAYS be at most 60-80 words and should contain the main keyword.

Text styling:
- Bold important bits of text or sentences so the post is easy to skim. Don't overdo it.
- Avoid italics and underlining unless you have to. Bolding is usually enough.
- Keep sentences short: at least 90% under 20 words, none longer than 35 words.

Paragraphs:
- At most 4 lines and no more than 60 words per paragraph.
- Break big points into several paragraphs so the text looks organised.

Tone and engagement:
- Keep the tone light, engaging and conversational.
- Ask rhetorical questions, use exclamations, slide in a joke or two.
- Avoid sensitive topics, words or names that might anger the reader.
- Stay friendly yet professional so the reader trusts what you wrote.

Point of view:
- Write in the first person (I, me, my), e.g. "I've done this haircut several times and never felt any difficulty at all...""#;

/// Build the prompt for one heading.
///
/// The whole prompt is sent as a single system message; `sample_article` is
/// the text extracted from the uploaded PDF and may be empty.
pub fn section_prompt(
    keyword: &str,
    heading: &str,
    guidelines: &str,
    sample_article: &str,
) -> String {
    format!(
        "Please make the Article focusing on the keyword {keyword}\n\n\
         Here is the Heading {heading}\n\n\
         {guidelines}\n\n\
         Here's the Sample Article {sample_article}"
    )
}

/// Build the answer-synthesis prompt for an index query.
pub fn query_prompt(contexts: &[&str], question: &str) -> String {
    let context = contexts.join("\n\n");
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_prompt_contains_all_inputs() {
        let p = section_prompt("solar panels", "Benefits", DEFAULT_GUIDELINES, "Sample body");
        assert!(p.starts_with("Please make the Article focusing on the keyword solar panels"));
        assert!(p.contains("Here is the Heading Benefits"));
        assert!(p.contains("Point of view"));
        assert!(p.ends_with("Here's the Sample Article Sample body"));
    }

    #[test]
    fn query_prompt_joins_contexts_in_order() {
        let p = query_prompt(&["first chunk", "second chunk"], "What is it?");
        let a = p.find("first chunk").unwrap();
        let b = p.find("second chunk").unwrap();
        assert!(a < b);
        assert!(p.contains("Query: What is it?"));
    }

    #[test]
    fn query_prompt_with_no_context_still_asks() {
        let p = query_prompt(&[], "Anything?");
        assert!(p.contains("Query: Anything?"));
    }
}
