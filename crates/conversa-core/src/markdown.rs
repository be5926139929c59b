//! Lightweight markdown to HTML conversion for chat replies.
//!
//! The conversion is a fixed sequence of string passes. Order matters:
//! angle brackets are escaped before any markup is introduced, and each later
//! pass sees the output of the ones before it.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

use crate::highlight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub syntax_highlighting: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            syntax_highlighting: true,
        }
    }
}

pub type Pass = fn(&str, &RenderOptions) -> String;

/// The rendering pipeline, applied top to bottom.
pub const PASSES: [(&str, Pass); 8] = [
    ("escape", escape_angle_brackets),
    ("bold", bold),
    ("italic", italic),
    ("bullets", bullets),
    ("fenced_code", fenced_code),
    ("inline_code", inline_code),
    ("line_breaks", line_breaks),
    ("trim", trim_trailing_breaks),
];

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*|__(.*?)__").expect("bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*|_(.*?)_").expect("italic regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\*\s(.+)$").expect("bullet regex"));
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(\w+)?\n((?s:.*?))```").expect("fence regex"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").expect("inline code regex"));
// A blank-line run and a single newline are told apart within one match, so
// no intermediate paragraph marker ever has to live in the text.
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n|\n").expect("line break regex"));

pub fn render(text: &str) -> String {
    render_with(text, &RenderOptions::default())
}

pub fn render_with(text: &str, options: &RenderOptions) -> String {
    PASSES
        .iter()
        .fold(text.to_string(), |acc, (name, pass)| {
            let next = pass(&acc, options);
            trace!(pass = name, len = next.len(), "markdown pass");
            next
        })
}

fn escape_html(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Either capture group of a two-delimiter alternation.
fn either<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

pub(crate) fn escape_angle_brackets(text: &str, _: &RenderOptions) -> String {
    escape_html(text)
}

pub(crate) fn bold(text: &str, _: &RenderOptions) -> String {
    BOLD.replace_all(text, |caps: &Captures| format!("<strong>{}</strong>", either(caps)))
        .into_owned()
}

pub(crate) fn italic(text: &str, _: &RenderOptions) -> String {
    ITALIC
        .replace_all(text, |caps: &Captures| format!("<em>{}</em>", either(caps)))
        .into_owned()
}

pub(crate) fn bullets(text: &str, _: &RenderOptions) -> String {
    BULLET.replace_all(text, "• $1").into_owned()
}

pub(crate) fn fenced_code(text: &str, options: &RenderOptions) -> String {
    FENCE
        .replace_all(text, |caps: &Captures| {
            let lang = caps.get(1).map(|m| m.as_str());
            let code = escape_html(caps[2].trim());
            let class = lang.map(|l| format!("language-{}", l)).unwrap_or_default();
            let body = if options.syntax_highlighting {
                highlight::highlight(&code, lang)
            } else {
                code
            };
            format!("<pre><code class=\"{}\">{}</code></pre>", class, body)
        })
        .into_owned()
}

pub(crate) fn inline_code(text: &str, _: &RenderOptions) -> String {
    INLINE_CODE.replace_all(text, "<code>$1</code>").into_owned()
}

pub(crate) fn line_breaks(text: &str, _: &RenderOptions) -> String {
    LINE_BREAK
        .replace_all(text, |caps: &Captures| {
            if caps[0].matches('\n').count() > 1 {
                "<br><br>"
            } else {
                "<br>"
            }
        })
        .into_owned()
}

pub(crate) fn trim_trailing_breaks(text: &str, _: &RenderOptions) -> String {
    let mut out = text;
    while let Some(stripped) = out.strip_suffix("<br>") {
        out = stripped;
    }
    out.trim().to_string()
}
