//! Shared flag parsing for builtins
//!
//! Leading `-` tokens are bundles of single-character switches (`-rf` is `r`
//! and `f`). A per-command allowlist of named options (`-n`, `-name`,
//! `-type`, `-maxdepth`) consumes the following token as a value, and
//! commands that accept it treat `-10` as a count rather than `1` and `0`.
//! Everything after `--` is positional.

use std::collections::{BTreeSet, HashMap};

/// What a command accepts besides plain switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagSpec {
    /// Options that take the next token as their value.
    pub value_options: &'static [&'static str],
    /// Accept `-N` as a numeric count.
    pub numeric_shorthand: bool,
}

impl FlagSpec {
    /// Switches only.
    pub const SWITCHES: FlagSpec = FlagSpec {
        value_options: &[],
        numeric_shorthand: false,
    };
}

/// Result of parsing a command's arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    switches: BTreeSet<char>,
    long: BTreeSet<String>,
    values: HashMap<&'static str, String>,
    /// `-N` count, when the command accepts it
    pub count: Option<usize>,
    /// Non-flag operands in order
    pub positional: Vec<String>,
}

impl ParsedArgs {
    /// Whether any of the given switches is set.
    pub fn has(&self, switches: &[char]) -> bool {
        switches.iter().any(|c| self.switches.contains(c))
    }

    /// Whether a `--long` option is set.
    pub fn has_long(&self, name: &str) -> bool {
        self.long.contains(name)
    }

    /// Value of a named option.
    pub fn value(&self, option: &str) -> Option<&str> {
        self.values.get(option).map(String::as_str)
    }

    /// First switch not in `allowed`.
    pub fn unknown_switch(&self, allowed: &[char]) -> Option<char> {
        self.switches.iter().copied().find(|c| !allowed.contains(c))
    }
}

/// Parse `args` according to `spec`.
///
/// Fails with the name of an option that is missing its value.
pub fn parse(args: &[String], spec: &FlagSpec) -> std::result::Result<ParsedArgs, String> {
    let mut parsed = ParsedArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            parsed.positional.extend(iter.by_ref().cloned());
            break;
        }
        if arg == "-" || !arg.starts_with('-') {
            parsed.positional.push(arg.clone());
            continue;
        }
        if let Some(name) = spec.value_options.iter().find(|o| **o == arg.as_str()) {
            let value = iter.next().ok_or_else(|| name.to_string())?;
            parsed.values.insert(*name, value.clone());
            continue;
        }
        if let Some(long) = arg.strip_prefix("--") {
            parsed.long.insert(long.to_string());
            continue;
        }

        let body = &arg[1..];
        if spec.numeric_shorthand && body.chars().all(|c| c.is_ascii_digit()) {
            parsed.count = body.parse().ok();
            continue;
        }
        // `-n5` style: a single-letter value option glued to its value
        if let Some(name) = spec
            .value_options
            .iter()
            .find(|o| o.len() == 2 && arg.starts_with(**o))
        {
            parsed.values.insert(*name, arg[2..].to_string());
            continue;
        }
        parsed.switches.extend(body.chars());
    }

    Ok(parsed)
}
