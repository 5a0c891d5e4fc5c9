//! Parser module for Shellquest
//!
//! One line is one simple command: there is no chaining, piping or
//! grouping. The lexer splits the line respecting quotes, then redirection
//! operators are separated from the argument vector and every word is
//! expanded against the session's variables.

mod lexer;
mod redirect;
mod tokens;

pub use lexer::Lexer;
pub use redirect::{CommandLine, HeredocSpec, OutputTarget, RedirectKind, StdinSource};
pub use tokens::{expand_vars, is_name};

use std::collections::HashMap;
use thiserror::Error;

/// Errors a command line can fail to parse with.
///
/// `Display` matches the text bash prints after its `bash: ` prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected EOF while looking for matching `{0}'")]
    UnterminatedQuote(char),

    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
}

/// Parser for a single command line.
pub struct Parser<'a> {
    input: &'a str,
    variables: Option<&'a HashMap<String, String>>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            variables: None,
        }
    }

    /// Expand `$NAME` against these variables. Without them every variable is unset.
    pub fn variables(mut self, variables: &'a HashMap<String, String>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Parse the input.
    pub fn parse(self) -> Result<CommandLine, ParseError> {
        let tokens = Lexer::new(self.input).tokenize()?;
        let variables = self.variables;
        let lookup = move |name: &str| variables.and_then(|v| v.get(name).cloned());
        redirect::split_redirections(tokens, &lookup)
    }
}
