use mcpp_protocol::placeholder::Placeholder;
use serde_json::Map;
use serde_json::Value;

use crate::cache::DataCache;

/// Tracking counters from a `resolve_with_tracking` pass.
/// `total` counts every placeholder *occurrence* visited during the walk,
/// not unique placeholder strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStatus {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
    pub unresolved: Vec<String>,
}

impl ResolutionStatus {
    pub fn is_fully_resolved(&self) -> bool {
        self.failed == 0
    }
}

/// Walks arbitrary JSON trees, substituting `{call_id.row.column}`
/// placeholders against a `DataCache`.
pub struct PlaceholderEngine<'a> {
    cache: &'a DataCache,
}

impl<'a> PlaceholderEngine<'a> {
    pub fn new(cache: &'a DataCache) -> Self {
        Self { cache }
    }

    /// Resolves every placeholder reachable in `data`, returning the
    /// (possibly partially) resolved value plus the tracking counters.
    pub fn resolve_with_tracking(&self, data: Value) -> (Value, ResolutionStatus) {
        let mut status = ResolutionStatus::default();
        let resolved = self.resolve_value(data, &mut status);
        (resolved, status)
    }

    fn resolve_value(&self, value: Value, status: &mut ResolutionStatus) -> Value {
        match value {
            Value::String(s) => self.resolve_string(&s, status),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.resolve_value(item, status))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, val) in map {
                    out.insert(key, self.resolve_value(val, status));
                }
                Value::Object(out)
            }
            scalar => scalar,
        }
    }

    /// Resolves placeholders inside a single string. A string that is
    /// *entirely* one placeholder preserves the cell's raw type; a string
    /// with embedded placeholders gets each occurrence stringified in
    /// place.
    fn resolve_string(&self, s: &str, status: &mut ResolutionStatus) -> Value {
        if let Some(placeholder) = Placeholder::parse_sole(s) {
            status.total += 1;
            return match self.lookup(&placeholder) {
                Some(cell) => {
                    status.resolved += 1;
                    cell
                }
                None => {
                    status.failed += 1;
                    status.unresolved.push(placeholder.to_wire_string());
                    Value::String(s.to_string())
                }
            };
        }

        let occurrences = Placeholder::find_all(s);
        if occurrences.is_empty() {
            return Value::String(s.to_string());
        }

        let mut out = String::with_capacity(s.len());
        let mut cursor = 0;
        for (range, placeholder) in occurrences {
            out.push_str(&s[cursor..range.start]);
            status.total += 1;
            match self.lookup(&placeholder) {
                Some(cell) => {
                    status.resolved += 1;
                    out.push_str(&stringify_cell(&cell));
                }
                None => {
                    status.failed += 1;
                    status.unresolved.push(placeholder.to_wire_string());
                    out.push_str(&s[range.clone()]);
                }
            }
            cursor = range.end;
        }
        out.push_str(&s[cursor..]);
        Value::String(out)
    }

    /// A placeholder resolves iff the cache has `call_id`, it is a table,
    /// the column exists, and the row is in range. Any
    /// other outcome — missing entry, non-table kind, unknown column,
    /// out-of-range row — is a resolution failure, not an engine error.
    fn lookup(&self, placeholder: &Placeholder) -> Option<Value> {
        let entry = self.cache.get(&placeholder.call_id)?;
        let table = entry.as_table()?;
        table.cell(placeholder.row_index, &placeholder.column_name).cloned()
    }
}

/// The "natural text rendering" of a cell value for embedded-placeholder
/// substitution.
fn stringify_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
