//! reStructuredText extraction.
//!
//! A line-oriented block parser walks the document recursively: every
//! construct that nests (block quotes, list items, directive bodies,
//! definitions, field bodies) is dedented and fed back through [`walk`]
//! with the same [`Accumulator`]. Inline markup is resolved per text run
//! by [`render_inline`].
//!
//! Only text survives. Code, literal and raw blocks, comments, hyperlink
//! targets, toctrees, images and includes are dropped; roles degrade to
//! their label; adornments, table borders and list markers disappear.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Extracted;

/// Nesting beyond this depth is ignored rather than recursed into.
const MAX_DEPTH: usize = 48;

/// Escaped ASCII punctuation is parked in the private use area while
/// inline markup is resolved, then restored.
const ESCAPE_BASE: u32 = 0xE000;

/// Directives whose argument and body never reach the index.
const DROPPED_DIRECTIVES: &[&str] = &[
    "code",
    "code-block",
    "sourcecode",
    "literalinclude",
    "exampleinclude",
    "include",
    "raw",
    "toctree",
    "image",
    "figure",
    "thumbnail",
    "graphviz",
    "mermaid",
    "math",
    "contents",
    "sectnum",
    "highlight",
    "doctest",
    "testcode",
    "testoutput",
    "testsetup",
    "ipython",
    "jinja",
    "autosummary",
    "tabularcolumns",
];

/// Directives whose argument is the first paragraph of their body.
const ADMONITIONS: &[&str] = &[
    "note",
    "warning",
    "tip",
    "hint",
    "important",
    "caution",
    "danger",
    "attention",
    "error",
    "seealso",
];

/// Directives whose argument is a condition or class list, not text.
const CONDITIONAL_DIRECTIVES: &[&str] = &["only", "ifconfig", "container", "rst-class", "class"];

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+\x{2022}\x{2023}\x{2043}](?: +|$)").expect("valid regex"));

static ENUMERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:\d+|#|[A-Za-z]|[ivxlcdm]+|[IVXLCDM]+)[.)]|\((?:\d+|#|[A-Za-z]|[ivxlcdm]+|[IVXLCDM]+)\))(?: +|$)",
    )
    .expect("valid regex")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:((?:[^:\\`]|\\.)+):(?:\s+(.*))?$").expect("valid regex")
});

static DIRECTIVE_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:([^:\s][^:]*):(?:\s+(.*))?$").expect("valid regex"));

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[\w.+-]|:[\w.+-])*)::(?:\s+(.*))?$").expect("valid regex")
});

static FOOTNOTE_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]\s]+)\](?:\s+(.*))?$").expect("valid regex"));

static OPTION_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-{1,2}[A-Za-z0-9][\w-]*(?:[ =][\w<>\[\].-]+)?(?:, -{1,2}[A-Za-z0-9][\w-]*(?:[ =][\w<>\[\].-]+)?)*)(?: {2,}(.*))?$",
    )
    .expect("valid regex")
});

static GRID_BORDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+(?:[-=:]+\+)+$").expect("valid regex"));

static SIMPLE_BORDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=+(?: +=+)+$").expect("valid regex"));

static SIMPLE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-+(?: +-+)*$").expect("valid regex"));

static SUBSTITUTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\.\.\s+\|([^|]+)\|\s+([\w:.-]+)::(?:\s+(.*))?$").expect("valid regex")
});

static SUBSTITUTION_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|([^|\s](?:[^|]*[^|\s])?)\|(?:__?)?").expect("valid regex")
});

static INTERPRETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(:[A-Za-z0-9](?:[\w.+-]|:[\w.+-])*:)?`([^`]+)`(:[A-Za-z0-9](?:[\w.+-]|:[\w.+-])*:|__?)?",
    )
    .expect("valid regex")
});

static FOOTNOTE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s?\[(?:\d+|#[\w.-]*|\*|[A-Za-z][\w.-]*)\]_").expect("valid regex")
});

static STRONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*([^*\s](?:[^*]*[^*\s])?)\*\*").expect("valid regex")
});

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").expect("valid regex"));

static SIMPLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b([A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?)__?(\s|$|[.,;:!?)\]'"])"#)
        .expect("valid regex")
});

/// Parse an RST document.
pub fn extract(text: &str) -> Extracted {
    let lines = prepare_lines(text);
    let mut acc = Accumulator::new(collect_substitutions(&lines));
    walk(&lines, &mut acc, 0);
    acc.finish()
}

/// State threaded through the recursive walk.
struct Accumulator {
    title: Option<String>,
    meta_description: Option<String>,
    docinfo_description: Option<String>,
    first_paragraph: Option<String>,
    content: Vec<String>,
    /// `|name|` to replacement text; `None` for non-text substitutions.
    substitutions: HashMap<String, Option<String>>,
    /// A body element has been emitted at the top level.
    seen_body: bool,
    /// Depth of field-list nesting; paragraphs there are never descriptions.
    in_fields: usize,
}

impl Accumulator {
    fn new(substitutions: HashMap<String, Option<String>>) -> Self {
        Self {
            title: None,
            meta_description: None,
            docinfo_description: None,
            first_paragraph: None,
            content: Vec::new(),
            substitutions,
            seen_body: false,
            in_fields: 0,
        }
    }

    fn inline(&self, raw: &str) -> String {
        render_inline(raw, &self.substitutions)
    }

    fn text(&mut self, raw: &str) {
        let rendered = self.inline(raw);
        if !rendered.trim().is_empty() {
            self.content.push(rendered);
        }
    }

    fn paragraph(&mut self, raw: &str) {
        let rendered = self.inline(raw);
        if rendered.trim().is_empty() {
            return;
        }
        if self.in_fields == 0 {
            self.seen_body = true;
            if self.first_paragraph.is_none() {
                self.first_paragraph = Some(rendered.clone());
            }
        }
        self.content.push(rendered);
    }

    fn finish(self) -> Extracted {
        Extracted {
            title: self.title,
            description: self
                .meta_description
                .or(self.docinfo_description)
                .or(self.first_paragraph),
            content: self.content.join(" "),
        }
    }
}

fn prepare_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            for c in line.chars() {
                if c == '\t' {
                    let pad = 8 - out.chars().count() % 8;
                    out.extend(std::iter::repeat(' ').take(pad));
                } else {
                    out.push(c);
                }
            }
            out.truncate(out.trim_end().len());
            out
        })
        .collect()
}

/// Substitution definitions apply document-wide, including before the
/// definition, so they are gathered up front.
fn collect_substitutions(lines: &[String]) -> HashMap<String, Option<String>> {
    let mut subs = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = SUBSTITUTION_DEF.captures(line) else {
            continue;
        };
        let name = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
        let value = if &caps[2] == "replace" {
            let mut value = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
            let base = indent(line);
            for next in &lines[i + 1..] {
                if next.is_empty() || indent(next) <= base {
                    break;
                }
                value.push(' ');
                value.push_str(next.trim());
            }
            Some(value)
        } else {
            None
        };
        subs.entry(name).or_insert(value);
    }
    subs
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Strip the common indentation of `lines`.
fn dedent(lines: &[String]) -> Vec<String> {
    let n = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| indent(l))
        .min()
        .unwrap_or(0);
    dedent_by(lines, n)
}

fn dedent_by(lines: &[String], n: usize) -> Vec<String> {
    lines
        .iter()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                l[indent(l).min(n)..].to_string()
            }
        })
        .collect()
}

/// End (exclusive) of the indented block starting at `start`: blank or
/// indented lines, without trailing blanks.
fn indented_end(lines: &[String], start: usize) -> usize {
    let mut end = start;
    let mut last = start;
    while end < lines.len() {
        if !lines[end].is_empty() {
            if indent(&lines[end]) == 0 {
                break;
            }
            last = end + 1;
        }
        end += 1;
    }
    last
}

/// A line made of one repeated punctuation character.
fn is_adornment(line: &str) -> bool {
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    line.len() >= 2 && first.is_ascii_punctuation() && chars.all(|c| c == first)
}

fn walk(lines: &[String], acc: &mut Accumulator, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].as_str();

        if line.is_empty() {
            i += 1;
            continue;
        }

        // Block quote.
        if indent(line) > 0 {
            let end = indented_end(lines, i);
            walk(&dedent(&lines[i..end]), acc, depth + 1);
            i = end;
            continue;
        }

        if let Some((title, next)) = section_title(lines, i) {
            let rendered = acc.inline(&title);
            if acc.title.is_none() && !rendered.trim().is_empty() {
                acc.title = Some(rendered);
            }
            acc.text(&title);
            i = next;
            continue;
        }

        // Transition.
        if is_adornment(line) && line.len() >= 4 && lines.get(i + 1).is_none_or(|l| l.is_empty())
        {
            i += 1;
            continue;
        }

        if line == ".." || line.starts_with(".. ") {
            i = explicit_markup(lines, i, acc, depth);
            continue;
        }

        if GRID_BORDER.is_match(line) {
            i = grid_table(lines, i, acc);
            continue;
        }

        if SIMPLE_BORDER.is_match(line) {
            i = simple_table(lines, i, acc);
            continue;
        }

        // Doctest block.
        if line.starts_with(">>>") {
            while i < lines.len() && !lines[i].is_empty() {
                i += 1;
            }
            continue;
        }

        if line == "|" || line.starts_with("| ") {
            i = line_block(lines, i, acc);
            continue;
        }

        if let Some(width) = list_marker(lines, i) {
            i = list_item(lines, i, width, acc, depth);
            continue;
        }

        if let Some(caps) = FIELD.captures(line) {
            i = field(lines, i, &caps, acc, depth);
            continue;
        }

        if let Some(caps) = OPTION_LIST.captures(line) {
            let has_body = caps.get(2).is_some()
                || lines
                    .get(i + 1)
                    .is_some_and(|l| !l.is_empty() && indent(l) > 0);
            if has_body {
                i = option_item(lines, i, &caps, acc, depth);
                continue;
            }
        }

        // Definition list item: a term directly followed by an indented body.
        if lines
            .get(i + 1)
            .is_some_and(|l| !l.is_empty() && indent(l) > 0)
        {
            let term = line.split(" : ").next().unwrap_or(line);
            acc.text(term);
            if acc.in_fields == 0 {
                acc.seen_body = true;
            }
            let end = indented_end(lines, i + 1);
            walk(&dedent(&lines[i + 1..end]), acc, depth + 1);
            i = end;
            continue;
        }

        i = paragraph(lines, i, acc);
    }
}

/// Recognise an underlined or overlined section title at `i`.
fn section_title(lines: &[String], i: usize) -> Option<(String, usize)> {
    let line = lines[i].as_str();

    if is_adornment(line) {
        let text = lines.get(i + 1)?.trim();
        let under = lines.get(i + 2)?;
        if !text.is_empty()
            && !is_adornment(text)
            && is_adornment(under)
            && under.chars().next() == line.chars().next()
        {
            return Some((text.to_string(), i + 3));
        }
        return None;
    }

    let under = lines.get(i + 1)?;
    let title_len = line.trim().chars().count();
    if is_adornment(under) && under.chars().count() >= title_len.min(4) {
        return Some((line.trim().to_string(), i + 2));
    }
    None
}

/// Explicit markup block at `i`: comment, target, substitution
/// definition, footnote or directive.
fn explicit_markup(lines: &[String], i: usize, acc: &mut Accumulator, depth: usize) -> usize {
    let end = indented_end(lines, i + 1);
    let first = lines[i].get(2..).unwrap_or("").trim();
    let body = dedent(&lines[i + 1..end]);

    if first.is_empty() || first.starts_with('_') || first.starts_with('|') {
        return end;
    }

    if let Some(caps) = FOOTNOTE_DEF.captures(first) {
        let mut block = vec![caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string()];
        block.extend(body);
        walk(&block, acc, depth + 1);
        return end;
    }

    if let Some(caps) = DIRECTIVE.captures(first) {
        let argument = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        directive(&caps[1], argument, &body, acc, depth);
    }
    // Anything else is a comment.
    end
}

fn directive(name: &str, argument: &str, body: &[String], acc: &mut Accumulator, depth: usize) {
    let name = name.to_ascii_lowercase();
    let local = name.rsplit(':').next().unwrap_or(&name);
    let (args, options, content) = split_directive(argument, body);

    if local == "meta" {
        for (key, value) in options {
            if key.split_whitespace().next() == Some("description")
                && acc.meta_description.is_none()
            {
                acc.meta_description = Some(acc.inline(&value));
            }
        }
        return;
    }

    if DROPPED_DIRECTIVES.contains(&local) {
        return;
    }

    if ADMONITIONS.contains(&local) {
        let mut block = args;
        block.push(String::new());
        block.extend(content);
        walk(&block, acc, depth + 1);
        return;
    }

    if !CONDITIONAL_DIRECTIVES.contains(&local) {
        acc.text(&args.join(" "));
    }
    walk(&content, acc, depth + 1);
}

/// Split a directive into argument lines, options and content.
fn split_directive(
    argument: &str,
    body: &[String],
) -> (Vec<String>, Vec<(String, String)>, Vec<String>) {
    let mut args = Vec::new();
    if !argument.trim().is_empty() {
        args.push(argument.trim().to_string());
    }

    let mut j = 0;
    while j < body.len() && !body[j].is_empty() && !DIRECTIVE_OPTION.is_match(&body[j]) {
        args.push(body[j].trim().to_string());
        j += 1;
    }

    let mut options = Vec::new();
    while j < body.len() {
        let Some(caps) = DIRECTIVE_OPTION.captures(&body[j]) else {
            break;
        };
        let key = caps[1].trim().to_ascii_lowercase();
        let mut value = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
        j += 1;
        while j < body.len() && !body[j].is_empty() && indent(&body[j]) > 0 {
            value.push(' ');
            value.push_str(body[j].trim());
            j += 1;
        }
        options.push((key, value));
    }

    while j < body.len() && body[j].is_empty() {
        j += 1;
    }
    (args, options, dedent(&body[j..]))
}

fn list_marker(lines: &[String], i: usize) -> Option<usize> {
    let line = lines[i].as_str();
    if let Some(m) = BULLET.find(line) {
        return Some(m.end());
    }
    let m = ENUMERATOR.find(line)?;
    // An enumerator must be followed by a blank line, an indented
    // continuation or another item, otherwise it starts a paragraph.
    let valid = match lines.get(i + 1) {
        None => true,
        Some(next) => next.is_empty() || indent(next) > 0 || ENUMERATOR.is_match(next),
    };
    valid.then_some(m.end())
}

fn list_item(
    lines: &[String],
    i: usize,
    width: usize,
    acc: &mut Accumulator,
    depth: usize,
) -> usize {
    let end = indented_end(lines, i + 1);
    let continuation = &lines[i + 1..end];
    let min_indent = continuation
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| indent(l))
        .min()
        .unwrap_or(width);

    let mut block = vec![lines[i][width..].trim().to_string()];
    block.extend(dedent_by(continuation, min_indent.min(width)));
    walk(&block, acc, depth + 1);
    end
}

fn field(
    lines: &[String],
    i: usize,
    caps: &Captures<'_>,
    acc: &mut Accumulator,
    depth: usize,
) -> usize {
    let name = caps[1].trim().to_string();
    let end = indented_end(lines, i + 1);
    let mut block = vec![caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string()];
    block.extend(dedent(&lines[i + 1..end]));

    // A field list before any body element at the top level is docinfo.
    let docinfo = depth == 0 && !acc.seen_body;
    if docinfo {
        let key = name.to_ascii_lowercase();
        if (key == "description" || key == "abstract") && acc.docinfo_description.is_none() {
            let text = block
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            acc.docinfo_description = Some(acc.inline(&text));
        }
    } else {
        acc.text(&name);
    }

    acc.in_fields += 1;
    walk(&block, acc, depth + 1);
    acc.in_fields -= 1;
    end
}

fn option_item(
    lines: &[String],
    i: usize,
    caps: &Captures<'_>,
    acc: &mut Accumulator,
    depth: usize,
) -> usize {
    acc.content.push(caps[1].to_string());
    let end = indented_end(lines, i + 1);
    let mut block = vec![caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string()];
    block.extend(dedent(&lines[i + 1..end]));

    acc.in_fields += 1;
    walk(&block, acc, depth + 1);
    acc.in_fields -= 1;
    end
}

fn line_block(lines: &[String], mut i: usize, acc: &mut Accumulator) -> usize {
    while i < lines.len() && !lines[i].is_empty() {
        let line = &lines[i];
        let text = line.strip_prefix('|').unwrap_or(line);
        acc.text(text.trim());
        i += 1;
    }
    if acc.in_fields == 0 {
        acc.seen_body = true;
    }
    i
}

fn grid_table(lines: &[String], mut i: usize, acc: &mut Accumulator) -> usize {
    while i < lines.len() && !lines[i].is_empty() {
        let line = &lines[i];
        if !GRID_BORDER.is_match(line) {
            acc.text(&line.replace('|', " "));
        }
        i += 1;
    }
    i
}

fn simple_table(lines: &[String], start: usize, acc: &mut Accumulator) -> usize {
    let mut borders = 1;
    let mut i = start + 1;
    while i < lines.len() {
        let line = &lines[i];
        i += 1;
        if SIMPLE_BORDER.is_match(line) {
            borders += 1;
            if borders >= 2 && lines.get(i).is_none_or(|l| l.is_empty()) {
                break;
            }
            continue;
        }
        if !line.is_empty() && !SIMPLE_SPAN.is_match(line.trim()) {
            acc.text(line);
        }
    }
    i
}

fn paragraph(lines: &[String], start: usize, acc: &mut Accumulator) -> usize {
    let mut i = start;
    let mut parts = Vec::new();
    while i < lines.len() && !lines[i].is_empty() && indent(&lines[i]) == 0 {
        // An underline too short to make a title is not text either.
        let line = lines[i].as_str();
        if i == start || !is_adornment(line) || line.starts_with(':') {
            parts.push(line);
        }
        i += 1;
    }
    let text = parts.join(" ");
    let trimmed = text.trim_end();

    let Some(stripped) = trimmed.strip_suffix("::") else {
        acc.paragraph(trimmed);
        return i;
    };

    // `text::` keeps one colon, `text ::` keeps none, a bare `::` vanishes.
    let kept = if stripped.is_empty() {
        ""
    } else if stripped.ends_with(' ') {
        stripped.trim_end()
    } else {
        &trimmed[..trimmed.len() - 1]
    };
    acc.paragraph(kept);

    // Skip the literal block that follows.
    let mut j = i;
    while j < lines.len() && lines[j].is_empty() {
        j += 1;
    }
    if j < lines.len() && indent(&lines[j]) > 0 {
        return indented_end(lines, j);
    }
    i
}

/// Resolve inline markup in one run of text.
fn render_inline(raw: &str, subs: &HashMap<String, Option<String>>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        let Some(open) = rest.find("``") else {
            out.push_str(&render_plain(rest, subs));
            break;
        };
        let after = &rest[open + 2..];
        let Some(close) = after.find("``") else {
            out.push_str(&render_plain(rest, subs));
            break;
        };
        out.push_str(&render_plain(&rest[..open], subs));
        out.push_str(&after[..close]);
        rest = &after[close + 2..];
    }
    out
}

fn render_plain(text: &str, subs: &HashMap<String, Option<String>>) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = protect_escapes(text);

    let text = SUBSTITUTION_REF.replace_all(&text, |caps: &Captures<'_>| {
        let name = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
        match subs.get(&name) {
            Some(Some(value)) => protect_escapes(value),
            Some(None) => String::new(),
            None => name,
        }
    });

    let text = INTERPRETED.replace_all(&text, |caps: &Captures<'_>| {
        let label = caps[2].trim();
        match caps.get(3).map(|m| m.as_str()) {
            Some(suffix) if suffix.starts_with('_') => {
                embedded_title(label).unwrap_or_else(|| label.to_string())
            }
            _ => role_label(label),
        }
    });

    let text = FOOTNOTE_REF.replace_all(&text, "");
    let text = STRONG.replace_all(&text, "$1");
    let text = EMPHASIS.replace_all(&text, "$1");
    let text = SIMPLE_REF.replace_all(&text, "${1}${2}");

    restore_escapes(&text)
}

/// `title <target>` yields `title`; `<target>` alone yields `target`.
fn embedded_title(text: &str) -> Option<String> {
    let inner = text.strip_suffix('>')?;
    let open = inner.rfind('<')?;
    let title = inner[..open].trim();
    if title.is_empty() {
        Some(inner[open + 1..].trim().to_string())
    } else {
        Some(title.to_string())
    }
}

/// Label a role renders to: explicit title, else the target with `!`
/// dropped and `~` shortening dotted names to their last component.
fn role_label(text: &str) -> String {
    if let Some(title) = embedded_title(text) {
        return title;
    }
    let text = text.strip_prefix('!').unwrap_or(text);
    match text.strip_prefix('~') {
        Some(target) => target.rsplit('.').next().unwrap_or(target).to_string(),
        None => text.to_string(),
    }
}

fn protect_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(n) if n.is_whitespace() => {}
            Some(n) if n.is_ascii_punctuation() => {
                out.push(char::from_u32(ESCAPE_BASE + n as u32).unwrap_or(n));
            }
            Some(n) => out.push(n),
            None => {}
        }
    }
    out
}

fn restore_escapes(text: &str) -> String {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if (ESCAPE_BASE..ESCAPE_BASE + 128).contains(&code) {
                char::from_u32(code - ESCAPE_BASE).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize_whitespace;

    fn content(text: &str) -> String {
        normalize_whitespace(&extract(text).content)
    }

    #[test]
    fn title_description_and_content() {
        let out = extract(
            "DAGs\n====\n\nA DAG (Directed Acyclic Graph) is the core concept of Airflow.\n\n\
             DAGs are defined using Python code. They represent a collection of tasks\n\
             with dependencies between them.\n",
        );
        assert_eq!(out.title.as_deref(), Some("DAGs"));
        assert!(out
            .description
            .as_deref()
            .unwrap()
            .contains("Directed Acyclic Graph"));
        let text = normalize_whitespace(&out.content);
        assert!(text.contains("Python code"));
        assert!(text.contains("collection of tasks with dependencies"));
    }

    #[test]
    fn overlined_title_and_later_sections() {
        let out = extract(
            "==========\n Overview\n==========\n\nIntro text.\n\nDetails\n-------\n\nMore.\n",
        );
        assert_eq!(out.title.as_deref(), Some("Overview"));
        let text = normalize_whitespace(&out.content);
        assert!(text.contains("Details"));
        assert!(!text.contains("----"));
        assert!(!text.contains("===="));
    }

    #[test]
    fn short_underline_is_dropped_with_the_paragraph_kept() {
        let out = extract("Introduction to Airflow\n---\n\nBody text.\n");
        assert_eq!(out.title, None);
        assert_eq!(
            normalize_whitespace(&out.content),
            "Introduction to Airflow Body text."
        );

        let out = extract("DAG\n---\n\nBody text.\n");
        assert_eq!(out.title.as_deref(), Some("DAG"));

        assert_eq!(content("Example\n::\n\n    code\n\nAfter.\n"), "Example After.");
    }

    #[test]
    fn no_title_leaves_fallback_to_caller() {
        let out = extract("Some content without a proper title.\n");
        assert!(out.title.is_none());
        assert_eq!(
            out.description.as_deref(),
            Some("Some content without a proper title.")
        );
    }

    #[test]
    fn license_comment_and_targets_are_dropped() {
        let text = content(
            " .. Licensed to the Apache Software Foundation (ASF) under one\n\
             \x20   or more contributor license agreements.\n\n\
             .. _concepts:dags:\n\n\
             DAGs\n====\n\nBody text.\n",
        );
        assert_eq!(text, "DAGs Body text.");
    }

    #[test]
    fn code_blocks_are_dropped() {
        let text = content(
            "Example\n=======\n\nThis is regular text.\n\n.. code-block:: python\n   :linenos:\n\n\
             \x20  def my_function():\n       pass\n\nMore regular text.\n",
        );
        assert!(text.contains("This is regular text."));
        assert!(text.contains("More regular text."));
        assert!(!text.contains("my_function"));
        assert!(!text.contains("python"));
        assert!(!text.contains("linenos"));
    }

    #[test]
    fn literal_block_marker_rules() {
        let text = content("Example::\n\n    code here\n\nAfter.\n\nIntro ::\n\n    more code\n\n::\n\n    x = 1\n");
        assert_eq!(text, "Example: After. Intro");
    }

    #[test]
    fn admonitions_keep_text_without_syntax() {
        let text = content(
            "Directives\n==========\n\n.. note::\n   This is a note.\n\n.. warning:: Mind the gap.\n\nRegular text here.\n",
        );
        assert!(text.contains("This is a note."));
        assert!(text.contains("Mind the gap."));
        assert!(!text.contains("note::"));
        assert!(!text.contains(".."));
    }

    #[test]
    fn unknown_directive_keeps_argument_and_body() {
        let text = content(
            ".. versionadded:: 2.4\n   Datasets were introduced.\n\n.. toctree::\n   :maxdepth: 1\n\n   dags\n   tasks\n",
        );
        assert_eq!(text, "2.4 Datasets were introduced.");
    }

    #[test]
    fn roles_degrade_to_labels() {
        let text = content(
            "See :class:`~airflow.models.dag.DAG`, :doc:`Concepts </core-concepts/index>`, \
             :ref:`!plain` and `default role`.\n",
        );
        assert_eq!(text, "See DAG, Concepts, plain and default role.");
    }

    #[test]
    fn hyperlinks_footnotes_and_emphasis() {
        let text = content(
            "Read `Airflow <https://airflow.apache.org>`_ and Airflow_ docs [1]_ for \
             **bold** and *italic* with ``inline_code_``.\n",
        );
        assert_eq!(
            text,
            "Read Airflow and Airflow docs for bold and italic with inline_code_."
        );
    }

    #[test]
    fn escapes_suppress_markup() {
        let text = content("An \\*escaped\\* star and a back\\ slash.\n");
        assert_eq!(text, "An *escaped* star and a backslash.");
    }

    #[test]
    fn substitutions_apply_before_definition() {
        let text = content(
            "Use |product| daily. |logo|\n\n.. |product| replace:: **Apache Airflow**\n.. |logo| image:: logo.png\n",
        );
        assert_eq!(text, "Use Apache Airflow daily.");
    }

    #[test]
    fn description_priority() {
        let meta = extract(
            "Title\n=====\n\n:description: From docinfo.\n\nFirst paragraph.\n\n.. meta::\n   :description: From meta.\n   :keywords: a, b\n",
        );
        assert_eq!(meta.description.as_deref(), Some("From meta."));

        let docinfo = extract("Title\n=====\n\n:Abstract: From docinfo.\n:Author: Someone\n\nFirst paragraph.\n");
        assert_eq!(docinfo.description.as_deref(), Some("From docinfo."));

        let para = extract("Title\n=====\n\nFirst paragraph.\n\n:param x: Not a description.\n");
        assert_eq!(para.description.as_deref(), Some("First paragraph."));
    }

    #[test]
    fn field_list_paragraphs_are_not_descriptions() {
        let out = extract("Title\n=====\n\n:orphan:\n\n.. note:: x\n\nSecond.\n\n:type x: int\n");
        assert_eq!(out.description.as_deref(), Some("x"));
        let out = extract("Intro.\n\n:param conn_id: The connection id.\n");
        assert_eq!(out.description.as_deref(), Some("Intro."));
        assert!(normalize_whitespace(&out.content).contains("The connection id."));
    }

    #[test]
    fn lists_keep_item_text() {
        let text = content(
            "- first item\n  continues here\n- second item\n\n1. one\n2. two\n\n(a) alpha\n\n\
             term\n   Definition of the term.\n\n--verbose  Print more output.\n",
        );
        assert_eq!(
            text,
            "first item continues here second item one two alpha term Definition of the term. \
             --verbose Print more output."
        );
    }

    #[test]
    fn tables_keep_cell_text() {
        let grid = content(
            "+--------+--------+\n| Header | Other  |\n+========+========+\n| cell a | cell b |\n+--------+--------+\n",
        );
        assert_eq!(grid, "Header Other cell a cell b");

        let simple = content("=====  =====\nA      B\n=====  =====\nx      y\n=====  =====\n\nAfter.\n");
        assert_eq!(simple, "A B x y After.");
    }

    #[test]
    fn doctest_and_transitions_dropped() {
        let text = content("Before.\n\n>>> print(1)\n1\n\n----------\n\nAfter.\n");
        assert_eq!(text, "Before. After.");
    }

    #[test]
    fn line_blocks_and_quotes() {
        let text = content("| Line one\n| Line two\n\n    Quoted text.\n\n    -- Author\n");
        assert_eq!(text, "Line one Line two Quoted text. -- Author");
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut doc = String::new();
        for depth in 0..200 {
            doc.push_str(&" ".repeat(depth));
            doc.push_str("- item\n");
        }
        let out = extract(&doc);
        assert!(out.content.contains("item"));
    }
}
