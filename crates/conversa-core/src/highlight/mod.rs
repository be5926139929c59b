//! Code-block colorizers keyed by fence language tag.
//!
//! Input is code that has already been HTML-escaped by the markdown
//! renderer; output wraps tokens in `<span class="...">` markup. Unknown or
//! missing tags return the code unchanged.

mod lexical;
mod markup;

use lexical::Grammar;
use markup::{CssColorizer, HtmlColorizer};

/// Turns escaped source text into decorated markup. Never fails.
pub trait Colorize: Sync {
    fn colorize(&self, code: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Scala,
    Rust,
    Go,
    Html,
    Css,
    Json,
}

/// Fence tags recognized by [`Language::from_tag`]. Matching is exact.
const ALIASES: &[(&str, Language)] = &[
    ("javascript", Language::JavaScript),
    ("js", Language::JavaScript),
    ("typescript", Language::TypeScript),
    ("ts", Language::TypeScript),
    ("python", Language::Python),
    ("py", Language::Python),
    ("ruby", Language::Ruby),
    ("rb", Language::Ruby),
    ("php", Language::Php),
    ("swift", Language::Swift),
    ("kotlin", Language::Kotlin),
    ("scala", Language::Scala),
    ("rust", Language::Rust),
    ("go", Language::Go),
    ("html", Language::Html),
    ("css", Language::Css),
    ("json", Language::Json),
];

impl Language {
    pub fn from_tag(tag: &str) -> Option<Self> {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == tag)
            .map(|(_, language)| *language)
    }

    pub fn aliases() -> &'static [(&'static str, Language)] {
        ALIASES
    }

    pub fn colorizer(self) -> &'static dyn Colorize {
        match self {
            Language::JavaScript => &lexical::JAVASCRIPT,
            Language::TypeScript => &lexical::TYPESCRIPT,
            Language::Python => &lexical::PYTHON,
            Language::Ruby => &lexical::RUBY,
            Language::Php => &lexical::PHP,
            Language::Swift => &lexical::SWIFT,
            Language::Kotlin => &lexical::KOTLIN,
            Language::Scala => &lexical::SCALA,
            Language::Rust => &lexical::RUST,
            Language::Go => &lexical::GO,
            Language::Json => &lexical::JSON,
            Language::Html => &HtmlColorizer,
            Language::Css => &CssColorizer,
        }
    }
}

impl Colorize for Grammar {
    fn colorize(&self, code: &str) -> String {
        lexical::scan(self, code)
    }
}

pub fn highlight(code: &str, tag: Option<&str>) -> String {
    match tag.and_then(Language::from_tag) {
        Some(language) => language.colorizer().colorize(code),
        None => code.to_string(),
    }
}

pub(crate) fn span(class: &str, text: &str) -> String {
    format!("<span class=\"{}\">{}</span>", class, text)
}
