//! Record storage. Records are JSON documents grouped by kind and keyed by their `id`.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Jobs,
    RawItems,
    Companies,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Jobs, RecordKind::RawItems, RecordKind::Companies];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Jobs => "jobs",
            RecordKind::RawItems => "raw_items",
            RecordKind::Companies => "companies",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// The given records become the whole kind.
    Replace,
    /// Insert new ids, overwrite existing ones, keep the rest.
    Append,
}

pub trait Store: Send + Sync {
    /// Every record of `kind`, in insertion order.
    fn get_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError>;

    /// Returns the number of records written.
    fn save_all(&self, kind: RecordKind, records: &[Value], mode: SaveMode) -> Result<usize, StoreError>;
}

pub(crate) fn record_id(kind: RecordKind, record: &Value) -> Result<String, StoreError> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(StoreError::MissingId { kind: kind.as_str() })
}

/// Result of a typed read that keeps what it could not read.
#[derive(Debug)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    /// Rows that no longer match `T`, exactly as stored.
    pub unreadable: Vec<Value>,
}

/// Typed read that hands back unreadable rows instead of dropping them. Callers
/// that rewrite a whole kind must write these back.
pub fn load_partitioned<T: DeserializeOwned>(store: &dyn Store, kind: RecordKind) -> Result<Loaded<T>, StoreError> {
    let mut loaded = Loaded { records: Vec::new(), unreadable: Vec::new() };
    for row in store.get_all(kind)? {
        match T::deserialize(&row) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                warn!("Unreadable {} record {}: {}", kind.as_str(), row.get("id").unwrap_or(&serde_json::Value::Null), e);
                loaded.unreadable.push(row);
            }
        }
    }
    Ok(loaded)
}

/// Typed read. Rows that no longer match `T` are logged and skipped, so never
/// follow this with a `SaveMode::Replace` of the same kind.
pub fn load<T: DeserializeOwned>(store: &dyn Store, kind: RecordKind) -> Result<Vec<T>, StoreError> {
    Ok(load_partitioned(store, kind)?.records)
}

pub fn save<T: Serialize>(
    store: &dyn Store,
    kind: RecordKind,
    records: &[T],
    mode: SaveMode,
) -> Result<usize, StoreError> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    store.save_all(kind, &values, mode)
}
