//! Rendering retrieved interactions into prompt context.

use crate::types::RetrievedContext;

/// Render prior interactions as `Previous Q:` / `Previous A:` pairs.
///
/// Returns an empty string when there is nothing to render.
pub fn render_context(contexts: &[RetrievedContext]) -> String {
    contexts
        .iter()
        .map(|c| {
            format!(
                "Previous Q: {}\nPrevious A: {}\n\n",
                c.record.query, c.record.response
            )
        })
        .collect()
}

/// Prior interactions followed by the question being asked now.
pub fn with_context(contexts: &[RetrievedContext], question: &str) -> String {
    format!("{}Current Question: {}", render_context(contexts), question)
}
