//! Generation prompt assembly.
//!
//! Deterministic string composition with a fixed section order: system
//! preamble, then prior conversation (if any), then retrieved background
//! knowledge (if any), then the question — always last, since models
//! attend most reliably to the end of a long prompt.

use crate::models::ChatTurn;

const PREAMBLE: &str = "You are a professional AI assistant.";

const HISTORY_HEADER: &str =
    "[Prior conversation] (for reference, to help you follow the context):";

const CONTEXT_INSTRUCTION: &str = "Answer the [Latest question] using the [Background knowledge] \
below. Important: if the [Background knowledge] is entirely unrelated to the question, ignore it \
and answer from your general knowledge.";

/// Assemble the full generation prompt.
///
/// Empty `history` and `context` degrade to preamble + question with no
/// section headers emitted.
pub fn compose(question: &str, history: &[ChatTurn], context: &str) -> String {
    let mut prompt = String::from(PREAMBLE);

    if !history.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(HISTORY_HEADER);
        prompt.push('\n');
        for turn in history {
            let label = if turn.is_user() { "User" } else { "Assistant" };
            // Flatten content newlines so one line stays one turn.
            let content = turn.content.replace('\n', " ");
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&content);
            prompt.push('\n');
        }
    }

    if !context.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(CONTEXT_INSTRUCTION);
        prompt.push_str("\n\n[Background knowledge]:\n");
        prompt.push_str(context);
    }

    prompt.push_str("\n\n[Latest question]: ");
    prompt.push_str(question);
    prompt
}
