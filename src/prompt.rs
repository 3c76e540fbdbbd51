//! System-prompt composition shared by every provider adapter.

use crate::context::DocContext;

/// Fixed instructions every outbound request opens with.
pub const ASSISTANT_PRIMER: &str = "You are the documentation assistant for this site. \
     Answer with clear, concise explanations that reference the current page when relevant. \
     If the page does not cover the question, say so.";

/// Compose the system prompt: the primer, plus a document block when context
/// sending is enabled and the page actually produced text.
///
/// The block lists the slug, then the title and headings when present, then
/// the normalized document text. Blocks are separated by a blank line, lines
/// inside a block by single newlines.
pub fn build_system_prompt(context: &DocContext, include_context: bool) -> String {
    let mut sections = vec![ASSISTANT_PRIMER.to_string()];

    if include_context {
        if let Some(text) = &context.text {
            let mut meta_lines = vec![format!("Document slug: {}", context.meta.slug)];
            if let Some(title) = &context.meta.title {
                meta_lines.push(format!("Title: {title}"));
            }
            if !context.meta.headings.is_empty() {
                meta_lines.push(format!("Headings: {}", context.meta.headings.join(" | ")));
            }
            meta_lines.push(format!("Document content:\n{text}"));
            sections.push(meta_lines.join("\n"));
        }
    }

    sections.join("\n\n")
}
