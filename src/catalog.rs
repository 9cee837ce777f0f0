use std::collections::HashMap;

use tracing::debug;

use crate::error::DataIntegrityViolation;
use crate::merge::{self, MergeOptions};
use crate::model::CanonicalJobRecord;

/// Result of folding one batch into the catalog.
#[derive(Debug)]
pub struct CommitOutcome {
    pub records: Vec<CanonicalJobRecord>,
    pub inserted: usize,
    pub updated: usize,
}

/// Fold `incoming` into `existing` by dedup key. Matching records go through the
/// merger and the integrity check; one violation aborts the whole batch and the
/// caller must not write anything.
pub fn commit(
    existing: Vec<CanonicalJobRecord>,
    incoming: Vec<CanonicalJobRecord>,
    options: MergeOptions,
) -> Result<CommitOutcome, DataIntegrityViolation> {
    let mut records = existing;
    let mut index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();

    let mut inserted = 0;
    let mut updated = 0;

    for record in incoming {
        let key = record.key();
        match index.get(&key) {
            Some(&pos) => {
                let current = &records[pos];
                let merged = merge::merge(record, Some(current), options);
                merge::validate_integrity(&merged, Some(current))?;
                debug!("Merged {} into {}", key, merged.id);
                records[pos] = merged;
                updated += 1;
            }
            None => {
                index.insert(key, records.len());
                records.push(record);
                inserted += 1;
            }
        }
    }

    Ok(CommitOutcome { records, inserted, updated })
}
