//! Line classification
//!
//! Every physical line of an object file is one of:
//!
//! ```text
//! ObjectName               ^[A-Z][A-Za-z0-9_-]*$
//!   attributeKey: value    ^([a-z][A-Za-z0-9]*):\s*(.*)$
//!                          (blank, ignored)
//! ```
//!
//! preceded by `depth * indent_unit` spaces.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::FormatError;

#[allow(clippy::expect_used)]
static OBJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_-]*$").expect("object name pattern compiles"));

#[allow(clippy::expect_used)]
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z][A-Za-z0-9]*):\s*(.*)$").expect("attribute pattern compiles"));

/// What a non-indentation part of a line holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    ObjectName(&'a str),
    Attribute { key: &'a str, value: &'a str },
}

/// A classified line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<'a> {
    /// Nesting depth in indent units; always 0 for blank lines
    pub depth: usize,
    pub kind: LineKind<'a>,
    /// The line with indentation and trailing whitespace stripped
    pub content: &'a str,
}

/// Classify one raw line
///
/// The object-name pattern is tried before the attribute pattern. Lines
/// matching neither are rejected, as are lines whose leading space count is
/// not a multiple of `indent_unit`.
pub fn classify(raw: &str, indent_unit: usize, line: usize) -> Result<Classified<'_>, FormatError> {
    let content = raw.trim();
    if content.is_empty() {
        return Ok(Classified { depth: 0, kind: LineKind::Blank, content });
    }

    let spaces = raw.len() - raw.trim_start_matches(' ').len();
    let unit = indent_unit.max(1);
    if spaces % unit != 0 {
        return Err(FormatError::IndentStep { line, spaces, unit });
    }

    let kind = if OBJECT_NAME.is_match(content) {
        LineKind::ObjectName(content)
    } else if let Some(caps) = ATTRIBUTE.captures(content) {
        match (caps.get(1), caps.get(2)) {
            (Some(key), Some(value)) => LineKind::Attribute {
                key: key.as_str(),
                value: value.as_str(),
            },
            _ => return Err(malformed(line, content)),
        }
    } else {
        return Err(malformed(line, content));
    };

    Ok(Classified { depth: spaces / unit, kind, content })
}

fn malformed(line: usize, content: &str) -> FormatError {
    FormatError::MalformedLine { line, content: content.to_string() }
}
