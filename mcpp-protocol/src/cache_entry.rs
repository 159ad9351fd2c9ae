use std::collections::HashSet;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A cached tool result's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Table,
    Text,
    Json,
}

/// Tabular payload: an ordered, distinct, non-empty header row and
/// equal-length data rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDataError(pub String);

impl std::fmt::Display for TableDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TableDataError {}

impl TableData {
    /// Validates a table's invariants before accepting it: headers are
    /// distinct and non-empty, and every row has exactly as many cells as
    /// there are headers.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableDataError> {
        if headers.iter().any(String::is_empty) {
            return Err(TableDataError("headers must be non-empty strings".into()));
        }
        let distinct: HashSet<&str> = headers.iter().map(String::as_str).collect();
        if distinct.len() != headers.len() {
            return Err(TableDataError("headers must be distinct".into()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(TableDataError(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    headers.len()
                )));
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row_index: usize, column_name: &str) -> Option<&Value> {
        let col = self.column_index(column_name)?;
        self.rows.get(row_index)?.get(col)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
    pub is_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntryMetadata {
    pub fn new(tool_name: impl Into<String>, is_sensitive: bool) -> Self {
        Self {
            tool_name: tool_name.into(),
            created_at: Utc::now(),
            is_sensitive,
            expires_at: None,
        }
    }

    pub fn with_ttl(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// A single cached tool-call result. Only `Table` entries are resolvable
/// by the placeholder engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CachedEntry {
    Table {
        payload: TableData,
        metadata: EntryMetadata,
    },
    Text {
        payload: String,
        metadata: EntryMetadata,
    },
    Json {
        payload: Value,
        metadata: EntryMetadata,
    },
}

impl CachedEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            CachedEntry::Table { .. } => EntryKind::Table,
            CachedEntry::Text { .. } => EntryKind::Text,
            CachedEntry::Json { .. } => EntryKind::Json,
        }
    }

    pub fn metadata(&self) -> &EntryMetadata {
        match self {
            CachedEntry::Table { metadata, .. }
            | CachedEntry::Text { metadata, .. }
            | CachedEntry::Json { metadata, .. } => metadata,
        }
    }

    pub fn as_table(&self) -> Option<&TableData> {
        match self {
            CachedEntry::Table { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn rejects_duplicate_headers() {
        let err = TableData::new(
            vec!["ID".to_string(), "ID".to_string()],
            vec![],
        )
        .unwrap_err();
        assert!(err.0.contains("distinct"));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = TableData::new(
            vec!["ID".to_string(), "Name".to_string()],
            vec![vec![Value::from(1)]],
        )
        .unwrap_err();
        assert!(err.0.contains("cells"));
    }

    #[test]
    fn cell_lookup_by_row_and_column() {
        let table = TableData::new(
            vec!["ID".to_string(), "Age".to_string()],
            vec![vec![Value::from("1"), Value::from(42)]],
        )
        .unwrap();
        assert_eq!(table.cell(0, "Age"), Some(&Value::from(42)));
        assert_eq!(table.cell(1, "Age"), None);
        assert_eq!(table.cell(0, "Missing"), None);
    }
}
