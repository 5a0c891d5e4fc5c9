//! Redirection parsing
//!
//! Separates `>`, `>>`, `<` and `<<MARK` from the command's own arguments.
//! A line carries at most one stdin source and one stdout target; a later
//! operator of the same direction replaces an earlier one, as in bash.

use super::ParseError;
use super::tokens::{Token, Word};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandLine {
    /// Expanded argument vector, command name first
    pub argv: Vec<String>,
    /// Where stdin comes from
    pub stdin: Option<StdinSource>,
    /// Where stdout goes
    pub stdout: Option<OutputTarget>,
}

/// Source of a command's standard input.
#[derive(Debug, Clone, PartialEq)]
pub enum StdinSource {
    /// `< file`
    File(String),
    /// `<<MARK` / `<<-MARK`; the body arrives on following lines
    Heredoc(HeredocSpec),
}

/// Terminator and options of a pending heredoc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeredocSpec {
    /// Line that ends the body
    pub marker: String,
    /// `<<-`: strip leading tabs from body lines
    pub strip_tabs: bool,
    /// Unquoted marker: expand `$NAME` in the body
    pub expand: bool,
}

/// `> file` or `>> file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Target as typed, after expansion
    pub path: String,
    /// `>>` rather than `>`
    pub append: bool,
}

/// The redirection a line uses, by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    None,
    Heredoc,
    Append,
    Overwrite,
    Input,
}

impl CommandLine {
    /// Command name, if the line has one.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Which redirection applies, heredoc first, then append, overwrite, input.
    pub fn kind(&self) -> RedirectKind {
        match (&self.stdin, &self.stdout) {
            (Some(StdinSource::Heredoc(_)), _) => RedirectKind::Heredoc,
            (_, Some(OutputTarget { append: true, .. })) => RedirectKind::Append,
            (_, Some(OutputTarget { append: false, .. })) => RedirectKind::Overwrite,
            (Some(StdinSource::File(_)), None) => RedirectKind::Input,
            (None, None) => RedirectKind::None,
        }
    }

    /// Pending heredoc, if any.
    pub fn heredoc(&self) -> Option<&HeredocSpec> {
        match &self.stdin {
            Some(StdinSource::Heredoc(spec)) => Some(spec),
            _ => None,
        }
    }
}

/// Build a [`CommandLine`] from tokens, expanding words with `lookup`.
pub fn split_redirections(
    tokens: Vec<Token>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<CommandLine, ParseError> {
    let mut line = CommandLine::default();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) => line.argv.push(word.expand(lookup)),
            Token::RedirectOut | Token::RedirectAppend => {
                let target = operand(iter.next())?;
                line.stdout = Some(OutputTarget {
                    path: target.expand(lookup),
                    append: token == Token::RedirectAppend,
                });
            }
            Token::RedirectIn => {
                let target = operand(iter.next())?;
                line.stdin = Some(StdinSource::File(target.expand(lookup)));
            }
            Token::HereDoc | Token::HereDocStrip => {
                let marker = operand(iter.next())?;
                line.stdin = Some(StdinSource::Heredoc(HeredocSpec {
                    marker: marker.raw(),
                    strip_tabs: token == Token::HereDocStrip,
                    expand: !marker.is_quoted(),
                }));
            }
        }
    }
    Ok(line)
}

fn operand(next: Option<Token>) -> Result<Word, ParseError> {
    match next {
        Some(Token::Word(word)) => Ok(word),
        Some(Token::RedirectOut) => Err(ParseError::UnexpectedToken(">".to_string())),
        Some(Token::RedirectAppend) => Err(ParseError::UnexpectedToken(">>".to_string())),
        Some(Token::RedirectIn) => Err(ParseError::UnexpectedToken("<".to_string())),
        Some(Token::HereDoc) => Err(ParseError::UnexpectedToken("<<".to_string())),
        Some(Token::HereDocStrip) => Err(ParseError::UnexpectedToken("<<-".to_string())),
        None => Err(ParseError::UnexpectedToken("newline".to_string())),
    }
}
