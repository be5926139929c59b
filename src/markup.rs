//! Rendered reply markup to styled terminal lines.
//!
//! Understands exactly what the markdown renderer and highlighter emit:
//! `strong`, `em`, `code`, `pre`, `br`, `span class="..."` and the
//! `&lt;`/`&gt;` escapes. Unclosed tags in a partially revealed reply simply
//! style the rest of the text.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

fn class_style(class: &str) -> Style {
    let style = Style::default();
    match class {
        "keyword" => style.fg(Color::Magenta).add_modifier(Modifier::BOLD),
        "string" => style.fg(Color::Green),
        "number" => style.fg(Color::Yellow),
        "comment" => style.fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        "key" | "property" | "attribute" => style.fg(Color::LightBlue),
        "tag" | "selector" => style.fg(Color::LightRed),
        "symbol" | "variable" => style.fg(Color::LightCyan),
        "value" => style.fg(Color::LightGreen),
        _ => style,
    }
}

fn code_style() -> Style {
    Style::default().fg(Color::Cyan)
}

fn decode_entity(rest: &str) -> Option<(char, usize)> {
    [
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&amp;", '&'),
        ("&quot;", '"'),
        ("&#39;", '\''),
    ]
    .into_iter()
    .find(|(entity, _)| rest.starts_with(entity))
    .map(|(entity, ch)| (ch, entity.len()))
}

struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    text: String,
    styles: Vec<Style>,
}

impl LineBuilder {
    fn new(base: Style) -> Self {
        Self {
            lines: Vec::new(),
            spans: Vec::new(),
            text: String::new(),
            styles: vec![base],
        }
    }

    fn current(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let style = self.current();
            self.spans.push(Span::styled(std::mem::take(&mut self.text), style));
        }
    }

    fn end_line(&mut self) {
        self.flush_text();
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
    }

    fn line_is_empty(&self) -> bool {
        self.text.is_empty() && self.spans.is_empty()
    }

    fn open(&mut self, style: Style) {
        self.flush_text();
        let next = self.current().patch(style);
        self.styles.push(next);
    }

    fn close(&mut self) {
        self.flush_text();
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn tag(&mut self, tag: &str) {
        let name = tag
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();

        match name {
            "br" | "br/" => self.end_line(),
            "strong" => self.open(Style::default().add_modifier(Modifier::BOLD)),
            "em" => self.open(Style::default().add_modifier(Modifier::ITALIC)),
            "code" => self.open(code_style()),
            "pre" => {
                if !self.line_is_empty() {
                    self.end_line();
                }
            }
            "/pre" => self.end_line(),
            "span" => {
                let class = tag
                    .split("class=\"")
                    .nth(1)
                    .and_then(|rest| rest.split('"').next())
                    .unwrap_or_default();
                self.open(class_style(class));
            }
            "/strong" | "/em" | "/code" | "/span" => self.close(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.line_is_empty() || self.lines.is_empty() {
            self.end_line();
        }
        self.lines
    }
}

pub fn markup_lines(markup: &str, base: Style) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::new(base);
    let mut rest = markup;

    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some(end) = rest.find('>') {
                builder.tag(&rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }
        if ch == '&' {
            if let Some((decoded, len)) = decode_entity(rest) {
                builder.text.push(decoded);
                rest = &rest[len..];
                continue;
            }
        }
        if ch == '\n' {
            builder.end_line();
        } else {
            builder.text.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }

    builder.finish()
}

/// Plain text of a line, for tests and width estimates.
pub fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(line_text).collect()
    }

    #[test]
    fn test_plain_text_is_one_line() {
        let lines = markup_lines("Olá!", Style::default());
        assert_eq!(texts(&lines), vec!["Olá!"]);
    }

    #[test]
    fn test_breaks_split_lines() {
        let lines = markup_lines("um<br>dois<br><br>três", Style::default());
        assert_eq!(texts(&lines), vec!["um", "dois", "", "três"]);
    }

    #[test]
    fn test_strong_is_bold() {
        let lines = markup_lines("a <strong>b</strong> c", Style::default());
        let spans = &lines[0].spans;
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].content, "b");
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(!spans[2].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_entities_decoded() {
        let lines = markup_lines("&lt;script&gt;", Style::default());
        assert_eq!(texts(&lines), vec!["<script>"]);
    }

    #[test]
    fn test_code_block_keeps_newlines_and_colors() {
        let markup = "antes<pre><code class=\"language-rust\"><span class=\"keyword\">fn</span> main() {\n}</code></pre>depois";
        let lines = markup_lines(markup, Style::default());
        assert_eq!(texts(&lines), vec!["antes", "fn main() {", "}", "depois"]);

        let keyword = &lines[1].spans[0];
        assert_eq!(keyword.content, "fn");
        assert_eq!(keyword.style.fg, Some(Color::Magenta));
        assert_eq!(lines[1].spans[1].style.fg, Some(Color::Cyan));
    }

    #[test]
    fn test_partial_reveal_styles_remaining_text() {
        let lines = markup_lines("<em>meio", Style::default());
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_empty_markup_yields_one_empty_line() {
        assert_eq!(texts(&markup_lines("", Style::default())), vec![""]);
    }
}
