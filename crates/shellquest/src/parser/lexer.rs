//! Lexer for command lines
//!
//! Splits one input line into words and redirection operators. Quote
//! characters are consumed, not preserved; operators inside quotes are
//! ordinary text.

use super::ParseError;
use super::tokens::{Token, Word, WordPart};

/// Lexer for a single command line.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Tokenize the whole line.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Get the next token from the input.
    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();
        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };

        let token = match ch {
            '>' => {
                self.advance();
                if self.peek_char() == Some('>') {
                    self.advance();
                    Token::RedirectAppend
                } else {
                    Token::RedirectOut
                }
            }
            '<' => {
                self.advance();
                if self.peek_char() == Some('<') {
                    self.advance();
                    if self.peek_char() == Some('-') {
                        self.advance();
                        Token::HereDocStrip
                    } else {
                        Token::HereDoc
                    }
                } else {
                    Token::RedirectIn
                }
            }
            _ => Token::Word(self.read_word()?),
        };
        Ok(Some(token))
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == ' ' || ch == '\t' || ch == '\n' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> Result<Word, ParseError> {
        let mut word = Word::default();
        let mut text = String::new();

        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\n' | '\r' | '>' | '<' => break,
                '\'' => {
                    self.advance();
                    flush(&mut word, &mut text);
                    let quoted = self.read_until('\'')?;
                    word.parts.push(WordPart::Literal(quoted));
                }
                '"' => {
                    self.advance();
                    flush(&mut word, &mut text);
                    self.read_double_quoted(&mut word)?;
                }
                '\\' => {
                    self.advance();
                    flush(&mut word, &mut text);
                    let escaped = self.advance().unwrap_or('\\');
                    word.parts.push(WordPart::Literal(escaped.to_string()));
                }
                _ => {
                    self.advance();
                    text.push(ch);
                }
            }
        }
        flush(&mut word, &mut text);
        Ok(word)
    }

    /// Read a single-quoted body; the opening quote is already consumed.
    fn read_until(&mut self, close: char) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.advance() {
                Some(c) if c == close => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(ParseError::UnterminatedQuote(close)),
            }
        }
    }

    /// Read a double-quoted body; the opening quote is already consumed.
    ///
    /// Backslash escapes `"`, `\`, `$` and `` ` ``; any other backslash is kept.
    fn read_double_quoted(&mut self, word: &mut Word) -> Result<(), ParseError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.peek_char() {
                    Some(c @ ('"' | '\\' | '$' | '`')) => {
                        self.advance();
                        if !text.is_empty() {
                            word.parts.push(WordPart::Quoted(std::mem::take(&mut text)));
                        }
                        word.parts.push(WordPart::Literal(c.to_string()));
                    }
                    _ => text.push('\\'),
                },
                Some(c) => text.push(c),
                None => return Err(ParseError::UnterminatedQuote('"')),
            }
        }
        // "" still produces an (empty) argument
        word.parts.push(WordPart::Quoted(text));
        Ok(())
    }
}

fn flush(word: &mut Word, text: &mut String) {
    if !text.is_empty() {
        word.parts.push(WordPart::Text(std::mem::take(text)));
    }
}
