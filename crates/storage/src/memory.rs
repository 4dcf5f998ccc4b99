//! In-memory backend.
//!
//! Used by tests and by simulation requests that must not touch durable
//! storage. Committed data lives behind one `parking_lot` mutex; snapshots
//! stage records locally until commit.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::record::{BigMapAction, BigMapDiff, ScriptRecord};
use crate::traits::{BigMapRepository, SchemaRepository};

#[derive(Debug, Default)]
struct Inner {
    diffs: Vec<BigMapDiff>,
    actions: Vec<BigMapAction>,
    ids: HashSet<String>,
    schemas: HashMap<String, ScriptRecord>,
}

/// Records staged by one open transaction.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    diffs: Vec<BigMapDiff>,
    actions: Vec<BigMapAction>,
}

impl MemorySnapshot {
    pub fn staged_diffs(&self) -> usize {
        self.diffs.len()
    }

    pub fn staged_actions(&self) -> usize {
        self.actions.len()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract script served by [`SchemaRepository::get`].
    pub fn with_schema(self, record: ScriptRecord) -> Self {
        self.inner
            .lock()
            .schemas
            .insert(record.address.clone(), record);
        self
    }

    pub fn diff_count(&self) -> usize {
        self.inner.lock().diffs.len()
    }

    pub fn action_count(&self) -> usize {
        self.inner.lock().actions.len()
    }

    fn select(&self, address: &str, network: &str, ptr: i64) -> Vec<BigMapDiff> {
        let inner = self.inner.lock();
        let mut rows: Vec<BigMapDiff> = inner
            .diffs
            .iter()
            .filter(|d| d.ptr == ptr && d.address == address && d.provenance.network == network)
            .cloned()
            .collect();
        // Stable: equal levels keep commit order.
        rows.sort_by_key(|d| d.provenance.level);
        rows
    }
}

#[async_trait]
impl BigMapRepository for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();

        let mut incoming = HashSet::new();
        let staged_ids = snapshot
            .diffs
            .iter()
            .map(|d| &d.id)
            .chain(snapshot.actions.iter().map(|a| &a.id));
        for id in staged_ids {
            if inner.ids.contains(id) || !incoming.insert(id.clone()) {
                return Err(StorageError::DuplicateRecord { id: id.clone() });
            }
        }

        inner.ids.extend(incoming);
        inner.diffs.extend(snapshot.diffs);
        inner.actions.extend(snapshot.actions);
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert_diffs(
        &self,
        snapshot: &mut MemorySnapshot,
        records: Vec<BigMapDiff>,
    ) -> Result<(), StorageError> {
        snapshot.diffs.extend(records);
        Ok(())
    }

    async fn insert_actions(
        &self,
        snapshot: &mut MemorySnapshot,
        records: Vec<BigMapAction>,
    ) -> Result<(), StorageError> {
        snapshot.actions.extend(records);
        Ok(())
    }

    async fn get_by_pointer(
        &self,
        address: &str,
        network: &str,
        ptr: i64,
    ) -> Result<Vec<BigMapDiff>, StorageError> {
        let rows = self.select(address, network, ptr);

        let mut latest: HashMap<&str, usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            latest.insert(row.key_hash.as_str(), idx);
        }
        let mut keep: Vec<usize> = latest.into_values().collect();
        keep.sort_unstable();

        Ok(keep
            .into_iter()
            .map(|idx| &rows[idx])
            .filter(|d| !d.is_removed())
            .cloned()
            .collect())
    }

    async fn history(
        &self,
        address: &str,
        network: &str,
        ptr: i64,
    ) -> Result<Vec<BigMapDiff>, StorageError> {
        Ok(self.select(address, network, ptr))
    }

    async fn actions(
        &self,
        address: &str,
        network: &str,
        ptr: i64,
    ) -> Result<Vec<BigMapAction>, StorageError> {
        let inner = self.inner.lock();
        let mut rows: Vec<BigMapAction> = inner
            .actions
            .iter()
            .filter(|a| a.touches(ptr) && a.address == address && a.provenance.network == network)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.provenance.level);
        Ok(rows)
    }
}

#[async_trait]
impl SchemaRepository for MemoryStorage {
    async fn get(&self, address: &str) -> Result<ScriptRecord, StorageError> {
        self.inner
            .lock()
            .schemas
            .get(address)
            .cloned()
            .ok_or_else(|| StorageError::SchemaNotFound {
                address: address.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;
    use tzindex_micheline::Micheline;

    #[tokio::test]
    async fn memory_backend_passes_conformance() {
        let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }

    #[tokio::test]
    async fn schema_lookup() {
        let storage = MemoryStorage::new().with_schema(ScriptRecord {
            address: "KT1A".to_string(),
            parameter: Micheline::prim("unit", vec![]),
            storage: Micheline::prim("nat", vec![]),
        });
        let record = SchemaRepository::get(&storage, "KT1A").await.unwrap();
        assert_eq!(record.storage, Micheline::prim("nat", vec![]));

        let err = SchemaRepository::get(&storage, "KT1B").await.unwrap_err();
        assert_eq!(
            err,
            StorageError::SchemaNotFound {
                address: "KT1B".to_string()
            }
        );
    }
}
