//! Token types for the lexer

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A word (command name, argument, redirection target)
    Word(Word),

    /// Redirect output (>)
    RedirectOut,

    /// Redirect output append (>>)
    RedirectAppend,

    /// Redirect input (<)
    RedirectIn,

    /// Here document (<<)
    HereDoc,

    /// Here document with tab stripping (<<-)
    HereDocStrip,
}

/// A word, kept as the pieces it was written in so that variable expansion
/// can skip the single-quoted ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

/// A piece of a word.
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Unquoted or double-quoted text; `$NAME` expands
    Text(String),
    /// Double-quoted text; `$NAME` expands
    Quoted(String),
    /// Single-quoted or backslash-escaped text; taken verbatim
    Literal(String),
}

impl Word {
    /// Word made of one unquoted piece.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            parts: vec![WordPart::Text(text.into())],
        }
    }

    /// Whether any piece of the word was quoted or escaped.
    ///
    /// A quoted heredoc marker disables expansion of the body.
    pub fn is_quoted(&self) -> bool {
        self.parts
            .iter()
            .any(|p| !matches!(p, WordPart::Text(_)))
    }

    /// The word with quotes removed and nothing expanded.
    pub fn raw(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                WordPart::Text(s) | WordPart::Quoted(s) | WordPart::Literal(s) => s.as_str(),
            })
            .collect()
    }

    /// The word with quotes removed and `$NAME` / `${NAME}` expanded.
    ///
    /// Unset variables expand to the empty string.
    pub fn expand(&self, lookup: &dyn Fn(&str) -> Option<String>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WordPart::Text(s) | WordPart::Quoted(s) => out.push_str(&expand_vars(s, lookup)),
                WordPart::Literal(s) => out.push_str(s),
            }
        }
        out
    }
}

/// Expand `$NAME` and `${NAME}` in `text`.
///
/// A `$` not followed by a name is kept as is.
pub fn expand_vars(text: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed && is_name(&name) {
                    out.push_str(&lookup(&name).unwrap_or_default());
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                    if closed {
                        out.push('}');
                    }
                }
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}

/// Check that a string is a valid variable name.
pub fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
