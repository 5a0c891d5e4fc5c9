//! echo builtin command

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The echo builtin command.
///
/// Usage: echo [-neE] [STRING...]
pub struct Echo;

#[async_trait]
impl Builtin for Echo {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut add_newline = true;
        let mut interpret_escapes = false;

        // Leading option words are only options if every letter is one
        let mut operands = ctx.args;
        while let Some((first, rest)) = operands.split_first() {
            let Some(letters) = first.strip_prefix('-') else {
                break;
            };
            if letters.is_empty() || !letters.chars().all(|c| matches!(c, 'n' | 'e' | 'E')) {
                break;
            }
            for c in letters.chars() {
                match c {
                    'n' => add_newline = false,
                    'e' => interpret_escapes = true,
                    _ => interpret_escapes = false,
                }
            }
            operands = rest;
        }

        let joined = operands.join(" ");
        let mut output = if interpret_escapes {
            match interpret_escape_sequences(&joined) {
                Escaped::Full(s) => s,
                Escaped::Stopped(s) => return Ok(ExecResult::ok(s)),
            }
        } else {
            joined
        };

        if add_newline {
            output.push('\n');
        }
        Ok(ExecResult::ok(output))
    }
}

enum Escaped {
    Full(String),
    /// `\c` was seen: no further output, not even the newline
    Stopped(String),
}

fn interpret_escape_sequences(s: &str) -> Escaped {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('a') => result.push('\x07'),
            Some('b') => result.push('\x08'),
            Some('f') => result.push('\x0c'),
            Some('v') => result.push('\x0b'),
            Some('0') => {
                let mut value = 0u32;
                for _ in 0..3 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                result.extend(char::from_u32(value));
            }
            Some('x') => {
                let mut value = 0u32;
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                result.extend(char::from_u32(value));
            }
            Some('c') => return Escaped::Stopped(result),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    Escaped::Full(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::Harness;

    fn expand(s: &str) -> String {
        match interpret_escape_sequences(s) {
            Escaped::Full(s) | Escaped::Stopped(s) => s,
        }
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(expand("hello\\nworld"), "hello\nworld");
        assert_eq!(expand("tab\\there"), "tab\there");
        assert_eq!(expand("\\\\backslash"), "\\backslash");
        assert_eq!(expand("\\x41\\0102"), "AB");
    }

    #[tokio::test]
    async fn test_echo_joins_args() {
        let h = Harness::new();
        assert_eq!(h.run(&Echo, &["hello", "world"]).await.stdout, "hello world\n");
    }

    #[tokio::test]
    async fn test_echo_flags() {
        let h = Harness::new();
        assert_eq!(h.run(&Echo, &["-n", "hi"]).await.stdout, "hi");
        assert_eq!(h.run(&Echo, &["-ne", "a\\tb"]).await.stdout, "a\tb");
        assert_eq!(h.run(&Echo, &["-e", "x\\cy"]).await.stdout, "x");
        assert_eq!(h.run(&Echo, &["-x", "hi"]).await.stdout, "-x hi\n");
    }
}
