//! Prompt assembly for the chat-completion call.

use crate::config::RetrievalConfig;
use crate::llm::ChatMessage;
use crate::models::RawResult;
use crate::text::truncate_chars;

pub const SYSTEM_PROMPT: &str = "You are NAVO, a knowledge discovery assistant for internal \
documentation. Answer the user's question using only the documentation snippets provided. \
If the snippets do not contain the answer, say that you do not know. Be concise and include \
specific details such as commands, settings, or page names when they are available.";

const SEPARATOR: &str = "\n---\n";

/// The documentation context handed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub text: String,
    /// How many results made it into `text`.
    pub included: usize,
}

impl PromptContext {
    /// Length in characters, as used by the confidence heuristic.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Build the context block from the first `max_context_results` results, in
/// fetch order.
///
/// Each part is `"{i}. {title} ({source})\n{excerpt}"`. When the joined text
/// exceeds `context_char_budget`, parts are dropped from the tail until it
/// fits, possibly leaving nothing.
pub fn build_context(results: &[RawResult], retrieval: &RetrievalConfig) -> PromptContext {
    let mut parts: Vec<String> = results
        .iter()
        .take(retrieval.max_context_results)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {} ({})\n{}",
                i + 1,
                r.title,
                r.source_name,
                truncate_chars(r.content.trim(), retrieval.excerpt_chars)
            )
        })
        .collect();

    let mut text = parts.join(SEPARATOR);
    while !parts.is_empty() && text.chars().count() > retrieval.context_char_budget {
        parts.pop();
        text = parts.join(SEPARATOR);
    }

    PromptContext {
        included: parts.len(),
        text,
    }
}

/// System + user messages for one question.
pub fn build_messages(question: &str, context: &PromptContext) -> Vec<ChatMessage> {
    let user = format!(
        "User question: {}\n\nDocumentation context:\n{}\n\nAnswer:",
        question.trim(),
        context.text
    );
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, content: &str) -> RawResult {
        RawResult {
            title: title.to_string(),
            url: String::new(),
            content: content.to_string(),
            source_name: "Confluence".to_string(),
            last_modified: None,
            author: None,
        }
    }

    #[test]
    fn numbers_parts_and_names_sources() {
        let results = vec![result("Deploy", "helm upgrade"), result("Rollback", "helm rollback")];
        let ctx = build_context(&results, &RetrievalConfig::default());
        assert_eq!(ctx.included, 2);
        assert_eq!(
            ctx.text,
            "1. Deploy (Confluence)\nhelm upgrade\n---\n2. Rollback (Confluence)\nhelm rollback"
        );
    }

    #[test]
    fn takes_first_five_in_fetch_order() {
        let results: Vec<RawResult> = (0..8).map(|i| result(&format!("T{}", i), "x")).collect();
        let ctx = build_context(&results, &RetrievalConfig::default());
        assert_eq!(ctx.included, 5);
        assert!(ctx.text.starts_with("1. T0"));
        assert!(!ctx.text.contains("T5"));
    }

    #[test]
    fn excerpts_are_capped() {
        let results = vec![result("Big", &"y".repeat(2000))];
        let ctx = build_context(&results, &RetrievalConfig::default());
        let excerpt = ctx.text.lines().nth(1).unwrap();
        assert_eq!(excerpt.chars().count(), 800);
    }

    #[test]
    fn drops_tail_parts_over_budget() {
        let retrieval = RetrievalConfig {
            context_char_budget: 1000,
            ..Default::default()
        };
        let results: Vec<RawResult> = (0..3)
            .map(|i| result(&format!("T{}", i), &"z".repeat(600)))
            .collect();
        let ctx = build_context(&results, &retrieval);
        assert_eq!(ctx.included, 1);
        assert!(ctx.char_len() <= 1000);

        let tiny = RetrievalConfig {
            context_char_budget: 5,
            ..Default::default()
        };
        let ctx = build_context(&results, &tiny);
        assert_eq!(ctx.included, 0);
        assert!(ctx.text.is_empty());
    }

    #[test]
    fn messages_carry_question_and_context() {
        let ctx = build_context(&[result("Deploy", "helm upgrade")], &RetrievalConfig::default());
        let messages = build_messages(" how do I deploy? ", &ctx);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("User question: how do I deploy?"));
        assert!(messages[1].content.contains("1. Deploy (Confluence)"));
    }
}
