#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

/// Matches a string whose *entire* content is a single placeholder.
/// Capture group 1 is the inner `call_id.row_index.column_name` triple.
static SOLE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{([A-Za-z0-9_-]+\.\d+\.[A-Za-z0-9_-]+)\}$").expect("valid regex"));

/// Matches each occurrence of a placeholder embedded anywhere in a longer
/// string.
static EMBEDDED_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_-]+\.\d+\.[A-Za-z0-9_-]+)\}").expect("valid regex"));

/// A parsed `{call_id.row_index.column_name}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub call_id: String,
    pub row_index: usize,
    pub column_name: String,
}

impl Placeholder {
    /// Parses the inner `call_id.row_index.column_name` triple already
    /// extracted by one of the two regexes above.
    fn parse_triple(triple: &str) -> Option<Self> {
        let mut parts = triple.splitn(3, '.');
        let call_id = parts.next()?.to_string();
        let row_index = parts.next()?.parse::<usize>().ok()?;
        let column_name = parts.next()?.to_string();
        Some(Self {
            call_id,
            row_index,
            column_name,
        })
    }

    /// If `s` is *entirely* one placeholder, returns it. Used to preserve
    /// the cell's original type on resolution.
    pub fn parse_sole(s: &str) -> Option<Self> {
        let caps = SOLE_PLACEHOLDER.captures(s)?;
        Self::parse_triple(&caps[1])
    }

    /// Finds every embedded placeholder occurrence in `s`, along with its
    /// byte span so callers can splice in the stringified replacement.
    pub fn find_all(s: &str) -> Vec<(std::ops::Range<usize>, Self)> {
        EMBEDDED_PLACEHOLDER
            .captures_iter(s)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let placeholder = Self::parse_triple(&caps[1])?;
                Some((whole.range(), placeholder))
            })
            .collect()
    }

    pub fn to_wire_string(&self) -> String {
        format!("{{{}.{}.{}}}", self.call_id, self.row_index, self.column_name)
    }
}
