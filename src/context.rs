//! Document-context extraction.
//!
//! Produces the immutable [`DocContext`] a session converses about: the
//! document's markdown reduced to plain text, capped at a fixed character
//! limit. Built once before the session starts and treated as read-only
//! afterwards.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum plain-text characters a document may contribute to the prompt.
pub const CONTEXT_CHAR_LIMIT: usize = 6000;

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---[\s\S]*?---\s*").expect("frontmatter regex"));
static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("code fence regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("inline code regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^\)]+\)").expect("link regex"));
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^\)]+\)").expect("image regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s*").expect("heading regex"));
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s?").expect("blockquote regex"));
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_]{1,3}([^*_]+)[*_]{1,3}").expect("emphasis regex"));
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("html tag regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Why no usable context text could be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextError {
    TooLong,
    Missing,
}

/// Presentation metadata for the document under discussion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: Option<String>,
    pub slug: String,
    pub headings: Vec<String>,
}

impl DocMeta {
    pub fn new(slug: impl Into<String>) -> Self {
        DocMeta {
            title: None,
            slug: slug.into(),
            headings: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_headings(mut self, headings: Vec<String>) -> Self {
        self.headings = headings;
        self
    }
}

/// Immutable snapshot of the document a session converses about.
///
/// `text` is absent when extraction failed or the document was over the
/// limit; `error` says which. Length fields describe the normalized plain
/// text, not the raw markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocContext {
    pub text: Option<String>,
    pub original_length: usize,
    pub trimmed_length: usize,
    pub limit: usize,
    pub error: Option<ContextError>,
    pub meta: DocMeta,
}

impl DocContext {
    /// Context for a session with no document attached.
    pub fn empty() -> Self {
        DocContext {
            text: None,
            original_length: 0,
            trimmed_length: 0,
            limit: CONTEXT_CHAR_LIMIT,
            error: None,
            meta: DocMeta::default(),
        }
    }

    /// Context for a document whose source could not be read.
    pub fn missing(meta: DocMeta) -> Self {
        DocContext {
            text: None,
            original_length: 0,
            trimmed_length: 0,
            limit: CONTEXT_CHAR_LIMIT,
            error: Some(ContextError::Missing),
            meta,
        }
    }

    /// Build context from raw markdown source.
    pub fn from_markdown(raw: &str, meta: DocMeta) -> Self {
        Self::from_markdown_with_limit(raw, meta, CONTEXT_CHAR_LIMIT)
    }

    /// Build context from a markdown file on disk. An unreadable file yields
    /// a `missing` context rather than an error.
    pub fn from_file(path: impl AsRef<Path>, meta: DocMeta) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_markdown(&raw, meta),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document source unreadable");
                Self::missing(meta)
            }
        }
    }

    fn from_markdown_with_limit(raw: &str, meta: DocMeta, limit: usize) -> Self {
        let normalized = markdown_to_plain(raw);
        let original_length = normalized.chars().count();
        let truncated: String = normalized.chars().take(limit).collect();
        let trimmed_length = truncated.chars().count();

        if original_length > limit {
            return DocContext {
                text: None,
                original_length,
                trimmed_length,
                limit,
                error: Some(ContextError::TooLong),
                meta,
            };
        }

        DocContext {
            text: Some(truncated),
            original_length,
            trimmed_length,
            limit,
            error: None,
            meta,
        }
    }

    /// Whether this context is over the limit and must block sends.
    pub fn is_too_long(&self) -> bool {
        matches!(self.error, Some(ContextError::TooLong))
    }
}

/// Reduce markdown to prompt-friendly plain text: drop frontmatter, code
/// fences and markup, keep link labels, then collapse whitespace runs.
fn markdown_to_plain(markdown: &str) -> String {
    let text = FRONTMATTER_RE.replace(markdown, "");
    let text = CODE_FENCE_RE.replace_all(&text, " ");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = IMAGE_RE.replace_all(&text, "");
    let text = HEADING_RE.replace_all(&text, "");
    let text = BLOCKQUOTE_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "$1");
    let text = HTML_TAG_RE.replace_all(&text, " ");
    let text = text.replace('|', " ");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_syntax() {
        let raw = "---\ntitle: Guide\n---\n# Heading\n\nSome `inline` text with \
                   [a link](https://example.com) and **bold** words.\n\n\
                   ```rust\nfn hidden() {}\n```\n\n> quoted line\n";
        let context = DocContext::from_markdown(raw, DocMeta::new("guide"));

        let text = context.text.unwrap();
        assert_eq!(
            text,
            "Heading Some inline text with a link and bold words. quoted line"
        );
        assert!(context.error.is_none());
    }

    #[test]
    fn table_pipes_become_spaces() {
        let raw = "| a | b |\n| - | - |\n| 1 | 2 |\n";
        let context = DocContext::from_markdown(raw, DocMeta::new("table"));
        assert_eq!(context.text.unwrap(), "a b - - 1 2");
    }

    #[test]
    fn over_limit_document_is_rejected_whole() {
        let raw = "word ".repeat(2000);
        let context = DocContext::from_markdown(&raw, DocMeta::new("long"));

        assert!(context.text.is_none());
        assert_eq!(context.error, Some(ContextError::TooLong));
        assert!(context.is_too_long());
        assert!(context.original_length > context.limit);
        assert_eq!(context.trimmed_length, context.limit);
    }

    #[test]
    fn document_at_limit_is_kept() {
        let context =
            DocContext::from_markdown_with_limit("abcde", DocMeta::new("short"), 5);
        assert_eq!(context.text.as_deref(), Some("abcde"));
        assert_eq!(context.original_length, 5);
        assert_eq!(context.trimmed_length, 5);
        assert!(context.error.is_none());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let context = DocContext::from_markdown_with_limit("é é", DocMeta::new("utf"), 10);
        assert_eq!(context.original_length, 3);
        assert_eq!(context.text.as_deref(), Some("é é"));
    }

    #[test]
    fn unreadable_file_yields_missing() {
        let context = DocContext::from_file("/definitely/not/here.md", DocMeta::new("gone"));
        assert!(context.text.is_none());
        assert_eq!(context.error, Some(ContextError::Missing));
    }

    #[test]
    fn empty_context_has_no_error() {
        let context = DocContext::empty();
        assert!(context.text.is_none());
        assert!(context.error.is_none());
        assert_eq!(context.limit, CONTEXT_CHAR_LIMIT);
    }
}
