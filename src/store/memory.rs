use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::{record_id, RecordKind, SaveMode, Store};
use crate::error::StoreError;

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kinds: Mutex<HashMap<RecordKind, Vec<Value>>>,
}

impl Store for MemoryStore {
    fn get_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        let kinds = self.kinds.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(kinds.get(&kind).cloned().unwrap_or_default())
    }

    fn save_all(&self, kind: RecordKind, records: &[Value], mode: SaveMode) -> Result<usize, StoreError> {
        let ids = records
            .iter()
            .map(|r| record_id(kind, r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut kinds = self.kinds.lock().map_err(|_| StoreError::Poisoned)?;
        let rows = kinds.entry(kind).or_default();
        if mode == SaveMode::Replace {
            rows.clear();
        }

        let mut index: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| Some((record_id(kind, r).ok()?, i)))
            .collect();
        for (id, record) in ids.into_iter().zip(records) {
            match index.get(&id) {
                Some(&pos) => rows[pos] = record.clone(),
                None => {
                    index.insert(id, rows.len());
                    rows.push(record.clone());
                }
            }
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn append_upserts_by_id() {
        let store = MemoryStore::default();
        store
            .save_all(RecordKind::Jobs, &[json!({"id": "a", "v": 1}), json!({"id": "b", "v": 1})], SaveMode::Append)
            .unwrap();
        store
            .save_all(RecordKind::Jobs, &[json!({"id": "a", "v": 2}), json!({"id": "c", "v": 1})], SaveMode::Append)
            .unwrap();
        let rows = store.get_all(RecordKind::Jobs).unwrap();
        let summary: Vec<_> = rows.iter().map(|r| (r["id"].as_str().unwrap(), r["v"].as_i64().unwrap())).collect();
        assert_eq!(summary, vec![("a", 2), ("b", 1), ("c", 1)]);
    }

    #[test]
    fn replace_swaps_the_kind_only() {
        let store = MemoryStore::default();
        store.save_all(RecordKind::Jobs, &[json!({"id": "a"})], SaveMode::Append).unwrap();
        store.save_all(RecordKind::Companies, &[json!({"id": "acme"})], SaveMode::Append).unwrap();
        store.save_all(RecordKind::Jobs, &[json!({"id": "z"})], SaveMode::Replace).unwrap();
        assert_eq!(store.get_all(RecordKind::Jobs).unwrap(), vec![json!({"id": "z"})]);
        assert_eq!(store.get_all(RecordKind::Companies).unwrap().len(), 1);
    }
}
