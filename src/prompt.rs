//! Prompt assembly for the remote model.

/// Merge the question, page context and selected passage, in that order.
///
/// No truncation or token budgeting happens here; callers are expected to
/// have checked that `prompt` and `selected_text` are non-empty.
pub fn assemble(prompt: &str, context: &str, selected_text: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nSelected Text:\n{}",
        prompt, context, selected_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_layout() {
        let full = assemble(
            "what does this mean?",
            "Q3 results. Revenue grew 12% year over year.",
            "revenue grew 12%",
        );
        assert_eq!(
            full,
            "what does this mean?\n\nContext:\nQ3 results. Revenue grew 12% year over year.\n\nSelected Text:\nrevenue grew 12%"
        );
    }

    #[test]
    fn test_assemble_keeps_long_context_intact() {
        let context = "word ".repeat(50_000);
        let full = assemble("q", &context, "s");
        assert!(full.contains(&context));
        assert!(full.ends_with("Selected Text:\ns"));
    }
}
