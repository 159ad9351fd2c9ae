use mcpp_protocol::cache_entry::TableData;
use mcpp_protocol::placeholder::Placeholder;
use serde_json::Value;

use crate::cache::DataCache;
use crate::error::CoreError;
use crate::error::Result;

/// Jaro-Winkler similarity must strictly exceed this to count as a match.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatch {
    pub placeholder: String,
    pub similarity: f64,
    pub cells_scanned: usize,
}

/// Fuzzy-matches a free-text keyword against cached tabular data to mint a
/// placeholder.
pub struct ReferenceFinder<'a> {
    cache: &'a DataCache,
}

impl<'a> ReferenceFinder<'a> {
    pub fn new(cache: &'a DataCache) -> Self {
        Self { cache }
    }

    pub fn find(&self, call_id: &str, keyword: &str, column_name: Option<&str>) -> Result<ReferenceMatch> {
        let entry = self
            .cache
            .get(call_id)
            .ok_or_else(|| CoreError::DataNotFound(call_id.to_string()))?;
        let table = entry.as_table().ok_or_else(|| CoreError::NotATable(call_id.to_string()))?;

        let column_index = match column_name {
            Some(name) => Some(
                table
                    .column_index(name)
                    .ok_or_else(|| CoreError::UnknownColumn { call_id: call_id.to_string(), column: name.to_string() })?,
            ),
            None => None,
        };

        let keyword_lower = keyword.to_lowercase();
        let mut best: Option<(f64, usize, usize)> = None; // (similarity, row, col)
        let mut cells_scanned = 0usize;

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                if let Some(only_col) = column_index {
                    if col_idx != only_col {
                        continue;
                    }
                }
                cells_scanned += 1;
                let cell_text = stringify(cell).to_lowercase();
                let similarity = strsim::jaro_winkler(&keyword_lower, &cell_text);
                let better = match best {
                    Some((best_sim, ..)) => similarity > best_sim,
                    None => true,
                };
                if better {
                    best = Some((similarity, row_idx, col_idx));
                }
            }
        }

        match best {
            Some((similarity, row_idx, col_idx)) if similarity > SIMILARITY_THRESHOLD => {
                let placeholder = Placeholder {
                    call_id: call_id.to_string(),
                    row_index: row_idx,
                    column_name: table.headers[col_idx].clone(),
                };
                Ok(ReferenceMatch {
                    placeholder: placeholder.to_wire_string(),
                    similarity,
                    cells_scanned,
                })
            }
            Some((best_similarity, ..)) => Err(CoreError::ReferenceNotFound { best_similarity }),
            None => Err(CoreError::ReferenceNotFound { best_similarity: 0.0 }),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use mcpp_protocol::cache_entry::CachedEntry;
    use mcpp_protocol::cache_entry::EntryMetadata;

    fn cache_with_contacts() -> DataCache {
        let cache = DataCache::new();
        let table = TableData::new(
            vec!["Name".to_string(), "Email".to_string()],
            vec![
                vec![Value::from("Ana Silva"), Value::from("a@x")],
                vec![Value::from("Bo Park"), Value::from("b@y")],
            ],
        )
        .unwrap();
        cache.put(
            "t1",
            CachedEntry::Table { payload: table, metadata: EntryMetadata::new("search_contacts", true) },
        );
        cache
    }

    #[test]
    fn fuzzy_match_above_threshold_wins() {
        let cache = cache_with_contacts();
        let finder = ReferenceFinder::new(&cache);
        let found = finder.find("t1", "ana silvaa", None).unwrap();
        assert_eq!(found.placeholder, "{t1.0.Name}");
        assert!(found.similarity > SIMILARITY_THRESHOLD);
    }

    #[test]
    fn no_match_above_threshold_is_reference_not_found() {
        let cache = cache_with_contacts();
        let finder = ReferenceFinder::new(&cache);
        let err = finder.find("t1", "zzzz", None).unwrap_err();
        assert!(matches!(err, CoreError::ReferenceNotFound { .. }));
    }

    #[test]
    fn missing_call_id_is_data_not_found() {
        let cache = DataCache::new();
        let finder = ReferenceFinder::new(&cache);
        let err = finder.find("absent", "anything", None).unwrap_err();
        assert!(matches!(err, CoreError::DataNotFound(_)));
    }

    #[test]
    fn non_table_entry_errors() {
        let cache = DataCache::new();
        cache.put(
            "t2",
            CachedEntry::Text { payload: "hi".into(), metadata: EntryMetadata::new("echo", true) },
        );
        let finder = ReferenceFinder::new(&cache);
        assert!(matches!(finder.find("t2", "hi", None), Err(CoreError::NotATable(_))));
    }

    #[test]
    fn unknown_column_errors() {
        let cache = cache_with_contacts();
        let finder = ReferenceFinder::new(&cache);
        assert!(matches!(
            finder.find("t1", "ana", Some("Phone")),
            Err(CoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn column_restriction_only_scans_that_column() {
        let cache = cache_with_contacts();
        let finder = ReferenceFinder::new(&cache);
        let found = finder.find("t1", "a@x", Some("Email")).unwrap();
        assert_eq!(found.placeholder, "{t1.0.Email}");
        assert_eq!(found.cells_scanned, 2);
    }

    #[test]
    fn empty_table_has_no_match() {
        let cache = DataCache::new();
        let table = TableData::new(vec!["Name".to_string()], vec![]).unwrap();
        cache.put("empty", CachedEntry::Table { payload: table, metadata: EntryMetadata::new("t", true) });
        let finder = ReferenceFinder::new(&cache);
        assert!(matches!(finder.find("empty", "anything", None), Err(CoreError::ReferenceNotFound { .. })));
    }
}
