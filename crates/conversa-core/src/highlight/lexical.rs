use super::span;

/// Prefix tokens some languages color on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sigil {
    /// `:name` (Ruby symbols)
    Symbol,
    /// `$name` (PHP variables)
    Variable,
}

/// Token rules for one keyword-driven language.
///
/// Code is scanned once, left to right. At each position the first rule that
/// applies wins: entity, line comment, block comment, string, sigil, word.
/// Whole words are consumed at once, so keywords only match on word
/// boundaries and never inside a string, comment or emitted span.
#[derive(Debug)]
pub(crate) struct Grammar {
    pub keywords: &'static [&'static str],
    pub line_comment: Option<&'static str>,
    pub block_comments: bool,
    pub numbers: bool,
    pub quotes: &'static [u8],
    pub sigil: Option<Sigil>,
    /// Quoted strings followed by `:` are colored as keys.
    pub object_keys: bool,
}

const C_LIKE_QUOTES: &[u8] = b"'\"";

pub(crate) static JAVASCRIPT: Grammar = Grammar {
    keywords: &[
        "let", "const", "var", "function", "class", "import", "export", "return", "if", "else",
        "for", "while", "do", "switch", "case", "break", "continue", "try", "catch", "finally",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: true,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static TYPESCRIPT: Grammar = Grammar {
    keywords: &[
        "interface", "type", "enum", "namespace", "declare", "let", "const", "var", "function",
        "class", "import", "export", "return", "if", "else", "for", "while", "do", "switch",
        "case", "break", "continue", "try", "catch", "finally", "async", "await",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: true,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static PYTHON: Grammar = Grammar {
    keywords: &[
        "def", "class", "if", "else", "elif", "for", "while", "in", "is", "and", "or", "not",
        "return", "import", "from", "as", "try", "except", "finally", "with", "break",
        "continue", "catch", "throw",
    ],
    line_comment: Some("#"),
    block_comments: false,
    numbers: true,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static RUBY: Grammar = Grammar {
    keywords: &[
        "def", "class", "module", "if", "else", "elsif", "end", "do", "while", "for", "return",
        "yield", "include", "require", "begin", "rescue", "ensure",
    ],
    line_comment: Some("#"),
    block_comments: false,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: Some(Sigil::Symbol),
    object_keys: false,
};

pub(crate) static PHP: Grammar = Grammar {
    keywords: &[
        "function", "class", "public", "private", "protected", "static", "if", "else", "elseif",
        "endif", "switch", "case", "break", "continue", "return", "require", "include",
        "namespace", "use", "const", "array",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: Some(Sigil::Variable),
    object_keys: false,
};

pub(crate) static SWIFT: Grammar = Grammar {
    keywords: &[
        "let", "var", "func", "class", "struct", "enum", "protocol", "extension", "init",
        "deinit", "import", "if", "else", "switch", "case", "for", "while", "do", "try", "catch",
        "guard", "return", "break", "continue", "where",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static KOTLIN: Grammar = Grammar {
    keywords: &[
        "fun", "class", "object", "interface", "val", "var", "data", "when", "if", "else", "for",
        "while", "do", "return", "import", "package", "break", "continue", "as", "in", "is",
        "try", "catch", "finally", "with", "throw",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static SCALA: Grammar = Grammar {
    keywords: &[
        "def", "class", "trait", "object", "val", "var", "case", "match", "if", "else", "for",
        "while", "do", "return", "import", "package", "break", "continue", "try", "catch",
        "finally",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static RUST: Grammar = Grammar {
    keywords: &[
        "fn", "let", "mut", "const", "struct", "enum", "trait", "impl", "mod", "use", "pub",
        "as", "break", "continue", "if", "else", "match", "loop", "while", "for", "return", "in",
        "move", "unsafe",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static GO: Grammar = Grammar {
    keywords: &[
        "func", "var", "const", "type", "struct", "interface", "map", "if", "else", "switch",
        "case", "for", "range", "break", "continue", "return", "defer", "go", "import",
        "package",
    ],
    line_comment: Some("//"),
    block_comments: true,
    numbers: false,
    quotes: C_LIKE_QUOTES,
    sigil: None,
    object_keys: false,
};

pub(crate) static JSON: Grammar = Grammar {
    keywords: &[],
    line_comment: None,
    block_comments: false,
    numbers: true,
    quotes: b"\"",
    sigil: None,
    object_keys: true,
};

pub(crate) fn scan(grammar: &Grammar, code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    let mut pos = 0;

    while pos < code.len() {
        let rest = &code[pos..];
        let consumed = entity(rest)
            .or_else(|| line_comment(grammar, rest))
            .or_else(|| block_comment(grammar, rest))
            .or_else(|| string_literal(grammar, rest))
            .or_else(|| sigil(grammar, rest))
            .or_else(|| word(grammar, rest));

        match consumed {
            Some((len, markup)) => {
                out.push_str(&markup);
                pos += len;
            }
            None => match rest.chars().next() {
                Some(ch) => {
                    out.push(ch);
                    pos += ch.len_utf8();
                }
                None => break,
            },
        }
    }

    out
}

type Token = (usize, String);

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn word_len(text: &str) -> usize {
    text.bytes().take_while(|b| is_word_byte(*b)).count()
}

/// `&lt;`, `&gt;`, `&#39;` and friends pass through untouched.
fn entity(rest: &str) -> Option<Token> {
    if !rest.starts_with('&') {
        return None;
    }
    let body = &rest[1..];
    let semi = body.bytes().take(10).position(|b| b == b';')?;
    let name = &body[..semi];
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'#') {
        return None;
    }
    let len = semi + 2;
    Some((len, rest[..len].to_string()))
}

fn line_comment(grammar: &Grammar, rest: &str) -> Option<Token> {
    let marker = grammar.line_comment?;
    if !rest.starts_with(marker) {
        return None;
    }
    let end = rest.find('\n').unwrap_or(rest.len());
    Some((end, span("comment", &rest[..end])))
}

fn block_comment(grammar: &Grammar, rest: &str) -> Option<Token> {
    if !grammar.block_comments || !rest.starts_with("/*") {
        return None;
    }
    let close = rest[2..].find("*/")?;
    let end = close + 4;
    Some((end, span("comment", &rest[..end])))
}

/// Quoted literal ending at the next identical quote on the same line.
/// Backslash escapes are not honored.
fn string_literal(grammar: &Grammar, rest: &str) -> Option<Token> {
    let quote = *rest.as_bytes().first()?;
    if !grammar.quotes.contains(&quote) {
        return None;
    }
    let close = rest[1..].find(|c: char| c == quote as char || c == '\n')?;
    if rest.as_bytes()[close + 1] != quote {
        return None;
    }
    let end = close + 2;
    let literal = &rest[..end];

    let tail = rest[end..].trim_start_matches([' ', '\t']);
    if grammar.object_keys && tail.starts_with(':') {
        return Some((end, span("key", literal)));
    }
    Some((end, span("string", literal)))
}

fn sigil(grammar: &Grammar, rest: &str) -> Option<Token> {
    let (lead, class) = match grammar.sigil? {
        Sigil::Symbol => (':', "symbol"),
        Sigil::Variable => ('$', "variable"),
    };
    if !rest.starts_with(lead) {
        return None;
    }
    let len = word_len(&rest[1..]);
    if len == 0 {
        return None;
    }
    let end = len + 1;
    Some((end, span(class, &rest[..end])))
}

fn word(grammar: &Grammar, rest: &str) -> Option<Token> {
    let len = word_len(rest);
    if len == 0 {
        return None;
    }
    let word = &rest[..len];

    let markup = if grammar.numbers && word.bytes().all(|b| b.is_ascii_digit()) {
        span("number", word)
    } else if grammar.keywords.contains(&word) {
        span("keyword", word)
    } else {
        word.to_string()
    };
    Some((len, markup))
}
