//! Document parsers.
//!
//! A parser turns the raw bytes of one documentation file into a
//! [`ParsedDocument`]: title, optional description and plain-text content.
//! Parsers never fail loudly. Anything they cannot make sense of (invalid
//! UTF-8, a file with no text left after stripping markup) yields `None`,
//! which the orchestrator counts as a skip.
//!
//! The variant set is closed and selected by the source registry:
//!
//! | Variant | Format | Extensions |
//! |---------|--------|------------|
//! | [`ParserKind::StructuredMarkup`] | reStructuredText | `rst`, `rest` |
//! | [`ParserKind::Frontmatter`] | Markdown with YAML frontmatter | `md`, `markdown` |
//!
//! Section and URL are format-independent and are filled in by the
//! orchestrator, not here.

pub mod markdown;
pub mod rst;

use serde::Serialize;

use crate::models::{humanize, normalize_whitespace};

/// Which parser a source's files go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    /// reStructuredText: section titles, directives and roles.
    StructuredMarkup,
    /// Markdown with an optional leading YAML header.
    Frontmatter,
}

impl ParserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParserKind::StructuredMarkup => "structured-markup",
            ParserKind::Frontmatter => "frontmatter",
        }
    }

    /// File suffixes this parser reads, without the leading dot.
    pub fn supported_extensions(self) -> &'static [&'static str] {
        match self {
            ParserKind::StructuredMarkup => &["rst", "rest"],
            ParserKind::Frontmatter => &["md", "markdown"],
        }
    }

    /// Parse one file. `rel_path` is only used for the filename title
    /// fallback.
    pub fn parse(self, bytes: &[u8], rel_path: &str) -> Option<ParsedDocument> {
        let text = std::str::from_utf8(bytes).ok()?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let extracted = match self {
            ParserKind::StructuredMarkup => rst::extract(text),
            ParserKind::Frontmatter => markdown::extract(text),
        };
        extracted.finish(rel_path)
    }
}

/// What a parser pulled out of a file, before fallbacks.
#[derive(Debug, Default)]
pub struct Extracted {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: String,
}

impl Extracted {
    /// Apply whitespace normalisation and the filename title fallback.
    /// Returns `None` when no content survived.
    fn finish(self, rel_path: &str) -> Option<ParsedDocument> {
        let content = normalize_whitespace(&self.content);
        if content.is_empty() {
            return None;
        }
        let title = self
            .title
            .map(|t| normalize_whitespace(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_path(rel_path));
        let description = self
            .description
            .map(|d| normalize_whitespace(&d))
            .filter(|d| !d.is_empty());
        Some(ParsedDocument {
            title,
            description,
            content,
        })
    }
}

/// Format-specific output of a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
}

/// `guides/test-file.rst` becomes `Test File`.
pub fn title_from_path(rel_path: &str) -> String {
    let file = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let title = humanize(stem);
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}
