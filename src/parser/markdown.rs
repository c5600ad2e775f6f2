//! Markdown extraction with optional YAML frontmatter.
//!
//! ```markdown
//! ---
//! title: Python Client API
//! description: API reference for the Airflow Python client
//! ---
//!
//! # Python Client
//! ```
//!
//! Frontmatter supplies `title` and `description` when they are strings.
//! Templating tags are removed from the body before it is rendered to
//! plain text with `pulldown-cmark`. Code blocks are dropped and HTML is
//! reduced to its text.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use super::Extracted;

static LIQUID_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%-?\s*comment\s*-?%\}.*?\{%-?\s*endcomment\s*-?%\}").expect("valid regex")
});

static TEMPLATE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}|\{#.*?#\}").expect("valid regex"));

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("valid regex"));

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>]*)?/?>").expect("valid regex")
});

/// Parse a Markdown document.
pub fn extract(text: &str) -> Extracted {
    let (header, body) = split_frontmatter(text);
    let body = strip_templating(body);
    let (first_heading, content) = render(&body);

    Extracted {
        title: string_field(header.as_ref(), "title").or(first_heading),
        description: string_field(header.as_ref(), "description"),
        content,
    }
}

/// Split a leading `---` block from the body.
///
/// Returns the parsed header (`None` when absent or malformed) and the
/// body. A malformed header is still removed from the body.
fn split_frontmatter(text: &str) -> (Option<serde_yaml::Value>, &str) {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return (None, text);
    };
    if first.trim_end() != "---" {
        return (None, text);
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let header = &text[header_start..offset];
            let body = &text[offset + line.len()..];
            return (serde_yaml::from_str(header).ok(), body);
        }
        offset += line.len();
    }
    (None, text)
}

fn string_field(header: Option<&serde_yaml::Value>, key: &str) -> Option<String> {
    header?.get(key)?.as_str().map(str::to_string)
}

fn strip_templating(body: &str) -> String {
    let body = LIQUID_COMMENT.replace_all(body, "");
    TEMPLATE_TAG.replace_all(&body, "").into_owned()
}

fn strip_html(raw: &str) -> String {
    let text = HTML_COMMENT.replace_all(raw, " ");
    HTML_TAG.replace_all(&text, " ").into_owned()
}

/// Render Markdown to plain text, returning the first heading as well.
fn render(body: &str) -> (Option<String>, String) {
    let mut out = String::with_capacity(body.len());
    let mut first_heading: Option<String> = None;
    let mut heading: Option<String> = None;
    let mut html: Option<String> = None;
    let mut code_depth = 0usize;

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;

    for event in Parser::new_ext(body, options) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => code_depth += 1,
            Event::End(TagEnd::CodeBlock) => code_depth = code_depth.saturating_sub(1),
            _ if code_depth > 0 => {}

            Event::Start(Tag::Heading { .. }) => heading = Some(String::new()),
            Event::End(TagEnd::Heading(_)) => {
                if let Some(text) = heading.take() {
                    if first_heading.is_none() && !text.trim().is_empty() {
                        first_heading = Some(text.clone());
                    }
                    out.push_str(&text);
                    out.push(' ');
                }
            }

            Event::Start(Tag::HtmlBlock) => html = Some(String::new()),
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(raw) = html.take() {
                    out.push_str(&strip_html(&raw));
                    out.push(' ');
                }
            }
            Event::Html(raw) => match html.as_mut() {
                Some(buf) => buf.push_str(&raw),
                None => out.push_str(&strip_html(&raw)),
            },
            Event::InlineHtml(raw) => push_inline(&mut out, &mut heading, &strip_html(&raw)),

            Event::Text(text) | Event::Code(text) => push_inline(&mut out, &mut heading, &text),
            Event::SoftBreak | Event::HardBreak => push_inline(&mut out, &mut heading, " "),

            Event::End(
                TagEnd::Paragraph
                | TagEnd::Item
                | TagEnd::List(_)
                | TagEnd::BlockQuote(_)
                | TagEnd::TableHead
                | TagEnd::TableRow
                | TagEnd::TableCell
                | TagEnd::FootnoteDefinition,
            ) => out.push(' '),

            _ => {}
        }
    }

    (first_heading, out)
}

fn push_inline(out: &mut String, heading: &mut Option<String>, text: &str) {
    match heading.as_mut() {
        Some(buf) => buf.push_str(text),
        None => out.push_str(text),
    }
}
