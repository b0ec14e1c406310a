//! Resource path rewriting.
//!
//! Replacement strings use the `fn:replace` conventions: `$N` refers to a
//! captured group, `\$` and `\\` are literal. They are translated once, at
//! compile time, into the regex crate's `${N}` syntax.

use crate::error::CompileError;
use crate::routing::matcher::PathPattern;

#[derive(Debug, Clone)]
pub struct Replacement {
    source: String,
    translated: String,
}

impl Replacement {
    pub fn compile(source: &str, group_count: usize) -> Result<Self, CompileError> {
        let invalid = |reason: &str| CompileError::InvalidPattern {
            pattern: source.to_string(),
            reason: reason.to_string(),
        };

        let mut translated = String::with_capacity(source.len() + 8);
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('\\') => translated.push('\\'),
                    Some('$') => translated.push_str("$$"),
                    _ => return Err(invalid("backslash must escape '\\' or '$'")),
                },
                '$' => {
                    let first = chars
                        .next()
                        .and_then(|d| d.to_digit(10))
                        .ok_or_else(|| invalid("'$' must be followed by a group number"))?;
                    let mut number = first as usize;
                    // take further digits while they still name a group
                    while let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
                        let extended = number * 10 + d as usize;
                        if extended > group_count {
                            break;
                        }
                        number = extended;
                        chars.next();
                    }
                    translated.push_str(&format!("${{{}}}", number));
                }
                _ => translated.push(c),
            }
        }

        Ok(Self {
            source: source.to_string(),
            translated,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Apply to `path`; `None` when the pattern does not match.
    pub fn apply(&self, pattern: &PathPattern, path: &str) -> Option<String> {
        if !pattern.matches(path) {
            return None;
        }
        Some(
            pattern
                .regex()
                .replace(path, self.translated.as_str())
                .into_owned(),
        )
    }
}
