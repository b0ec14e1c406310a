//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile a descriptor URL pattern into a native regex
//! - Keep the group-number → name table (anonymous groups allowed)
//! - Expose matched paths as an ordered walk of literal text and group values
//!
//! # Design Decisions
//! - Patterns match the whole application-relative path (`^(?:...)$`)
//! - The XML-Schema name escapes `\i`, `\c` and their negations are
//!   translated to explicit classes; character-class subtraction `-[...]`
//!   maps onto the regex crate's `--[...]`
//! - Non-participating optional groups are skipped without consuming text

use std::fmt;
use std::ops::Range;

use regex::Regex;

use crate::error::CompileError;

const NAME_START: &str = r"_:A-Za-z\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}\x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}";
const NAME_EXTRA: &str = r"\-.0-9\x{B7}\x{300}-\x{36F}\x{203F}-\x{2040}";

/// A compiled URL pattern.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    /// Index `n - 1` holds the name of group `n`.
    groups: Vec<Option<String>>,
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("source", &self.source)
            .field("groups", &self.groups)
            .finish()
    }
}

impl PathPattern {
    /// Compile a pattern without named groups.
    pub fn new(pattern: &str) -> Result<Self, CompileError> {
        Self::with_groups(pattern, &[])
    }

    /// Compile a pattern with an out-of-band `(number, name)` table.
    ///
    /// Numbers start at 1. Numbers absent from the table stay anonymous.
    pub fn with_groups(pattern: &str, named: &[(usize, String)]) -> Result<Self, CompileError> {
        let invalid = |reason: String| CompileError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let translated = translate(pattern).map_err(invalid)?;
        let regex = Regex::new(&format!("^(?:{})$", translated))
            .map_err(|e| invalid(e.to_string()))?;

        let group_count = regex.captures_len() - 1;
        let mut groups = vec![None; group_count];
        for (number, name) in named {
            if *number == 0 {
                return Err(invalid("match group numbers start at 1".to_string()));
            }
            if *number > group_count {
                return Err(invalid(format!(
                    "match group {} but the pattern has {} groups",
                    number, group_count
                )));
            }
            let slot = &mut groups[number - 1];
            if slot.is_some() {
                return Err(invalid(format!("match group {} named twice", number)));
            }
            *slot = Some(name.clone());
        }

        Ok(Self {
            source: pattern.to_string(),
            regex,
            groups,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn group_names(&self) -> &[Option<String>] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn match_path<'a>(&'a self, path: &'a str) -> Option<PathMatch<'a>> {
        let captures = self.regex.captures(path)?;
        let spans = (1..=self.groups.len())
            .map(|i| captures.get(i).map(|m| m.range()))
            .collect();
        Some(PathMatch {
            path,
            spans,
            names: &self.groups,
        })
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// A successful match of a path against a pattern.
#[derive(Debug, Clone)]
pub struct PathMatch<'a> {
    path: &'a str,
    spans: Vec<Option<Range<usize>>>,
    names: &'a [Option<String>],
}

/// One element of the left-to-right walk over a matched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Group {
        number: usize,
        name: Option<&'a str>,
        value: &'a str,
    },
}

impl<'a> PathMatch<'a> {
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Value of group `number`, if it participated.
    pub fn group(&self, number: usize) -> Option<&'a str> {
        let span = self.spans.get(number.checked_sub(1)?)?.clone()?;
        Some(&self.path[span])
    }

    /// Named groups that participated, in group order.
    pub fn named(&self) -> Vec<(&'a str, &'a str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                let name = name.as_deref()?;
                self.group(i + 1).map(|value| (name, value))
            })
            .collect()
    }

    pub fn segments(&self) -> Segments<'_, 'a> {
        Segments {
            matched: self,
            next_group: 0,
            last: 0,
            pending: None,
            finished: false,
        }
    }
}

/// Sequential accessor over a `PathMatch`.
pub struct Segments<'m, 'a> {
    matched: &'m PathMatch<'a>,
    next_group: usize,
    last: usize,
    pending: Option<Segment<'a>>,
    finished: bool,
}

impl<'m, 'a> Iterator for Segments<'m, 'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }

        let path = self.matched.path;
        while self.next_group < self.matched.spans.len() {
            let index = self.next_group;
            self.next_group += 1;

            let Some(span) = self.matched.spans[index].clone() else {
                continue;
            };
            let group = Segment::Group {
                number: index + 1,
                name: self.matched.names[index].as_deref(),
                value: &path[span.clone()],
            };
            let literal_start = self.last;
            // nested groups end inside their parent
            self.last = self.last.max(span.end);
            if span.start > literal_start {
                self.pending = Some(group);
                return Some(Segment::Literal(&path[literal_start..span.start]));
            }
            return Some(group);
        }

        if !self.finished {
            self.finished = true;
            if self.last < path.len() {
                return Some(Segment::Literal(&path[self.last..]));
            }
        }
        None
    }
}

/// Translate the pattern dialect into regex-crate syntax.
fn translate(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "trailing backslash".to_string())?;
                match (escaped, class_depth > 0) {
                    ('i', false) => out.push_str(&format!("[{}]", NAME_START)),
                    ('c', false) => out.push_str(&format!("[{}{}]", NAME_START, NAME_EXTRA)),
                    ('I', false) => out.push_str(&format!("[^{}]", NAME_START)),
                    ('C', false) => out.push_str(&format!("[^{}{}]", NAME_START, NAME_EXTRA)),
                    ('i', true) => out.push_str(NAME_START),
                    ('c', true) => {
                        out.push_str(NAME_START);
                        out.push_str(NAME_EXTRA);
                    }
                    ('I', true) | ('C', true) => {
                        return Err(format!("\\{} is not supported inside a character class", escaped))
                    }
                    _ => {
                        out.push('\\');
                        out.push(escaped);
                    }
                }
            }
            '[' => {
                class_depth += 1;
                out.push('[');
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(']');
            }
            '-' if class_depth > 0 && chars.peek() == Some(&'[') => out.push_str("--"),
            _ => out.push(c),
        }
    }

    if class_depth > 0 {
        return Err("unterminated character class".to_string());
    }
    Ok(out)
}
