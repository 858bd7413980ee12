//! Event shape descriptors.
//!
//! A shape maps each staging column, in column order, to a path inside the
//! source JSON record. The document format is the usual jsonpaths file:
//!
//! ```json
//! { "jsonpaths": ["$['artist']", "$.auth", "$.location.city", "$.tags[0]"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigErrorCode, Error, Result};

/// One step of a JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Zero-based array element
    Index(usize),
}

/// Path-mapping descriptor for event records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventShape {
    pub jsonpaths: Vec<String>,
}

impl EventShape {
    pub fn new(jsonpaths: Vec<String>) -> Self {
        Self { jsonpaths }
    }

    /// Parse a jsonpaths document.
    pub fn from_json(document: &str) -> Result<Self> {
        serde_json::from_str(document).map_err(|e| {
            Error::config(
                ConfigErrorCode::InvalidEventShape,
                format!("invalid jsonpaths document: {}", e),
            )
        })
    }

    /// Parse every path, requiring exactly one per target column.
    pub fn resolve(&self, column_count: usize) -> Result<Vec<Vec<PathSegment>>> {
        if self.jsonpaths.len() != column_count {
            return Err(Error::config(
                ConfigErrorCode::InvalidEventShape,
                format!(
                    "event shape has {} paths but the target table has {} columns",
                    self.jsonpaths.len(),
                    column_count
                ),
            ));
        }
        self.jsonpaths.iter().map(|p| parse_json_path(p)).collect()
    }
}

/// Parse `$`-rooted paths in dotted, bracket-quoted or index form.
pub fn parse_json_path(path: &str) -> Result<Vec<PathSegment>> {
    let invalid = |reason: &str| {
        Error::config(
            ConfigErrorCode::InvalidEventShape,
            format!("invalid json path `{}`: {}", path, reason),
        )
    };

    let rest = path
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| invalid("must start with `$`"))?;
    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                    end += 1;
                }
                if end == start {
                    return Err(invalid("empty member name"));
                }
                segments.push(PathSegment::Key(chars[start..end].iter().collect()));
                i = end;
            }
            '[' => {
                let open = *chars.get(i + 1).ok_or_else(|| invalid("unterminated `[`"))?;
                if open == '\'' || open == '"' {
                    let start = i + 2;
                    let close = chars[start..]
                        .iter()
                        .position(|&c| c == open)
                        .map(|p| start + p)
                        .ok_or_else(|| invalid("unterminated quoted member"))?;
                    if chars.get(close + 1) != Some(&']') {
                        return Err(invalid("expected `]` after quoted member"));
                    }
                    segments.push(PathSegment::Key(chars[start..close].iter().collect()));
                    i = close + 2;
                } else {
                    let start = i + 1;
                    let close = chars[start..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|p| start + p)
                        .ok_or_else(|| invalid("unterminated `[`"))?;
                    let digits: String = chars[start..close].iter().collect();
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| invalid("array index must be a non-negative integer"))?;
                    segments.push(PathSegment::Index(index));
                    i = close + 1;
                }
            }
            _ => return Err(invalid("expected `.` or `[`")),
        }
    }

    if segments.is_empty() {
        return Err(invalid("path selects the whole record"));
    }
    Ok(segments)
}
