use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{BigMapAction, BigMapDiff, ScriptRecord};

/// Durable big-map history.
///
/// ## Snapshot Semantics
///
/// Inserts go through `&mut Self::Snapshot`, an in-progress transaction:
///
/// 1. `begin_snapshot()`: start a transaction
/// 2. `insert_diffs` / `insert_actions` with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: make every staged record durable at once
///    OR `abort_snapshot(snapshot)`: discard them
///
/// A dropped snapshot MUST behave as aborted. One operation group is always
/// written through one snapshot, so a failure never leaves a partial group.
///
/// ## Reads
///
/// `get_by_pointer` reflects every mutation committed before the call. It
/// returns the live state of one big map: for each key hash, the latest
/// record, dropping keys whose latest record is a deletion. Records are
/// ordered by level, then commit order.
#[async_trait]
pub trait BigMapRepository: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Recording operations (within snapshot) ────────────────────────────────

    /// Stage diff records. Commit fails with `DuplicateRecord` if an id already exists.
    async fn insert_diffs(
        &self,
        snapshot: &mut Self::Snapshot,
        records: Vec<BigMapDiff>,
    ) -> Result<(), StorageError>;

    /// Stage action records. Commit fails with `DuplicateRecord` if an id already exists.
    async fn insert_actions(
        &self,
        snapshot: &mut Self::Snapshot,
        records: Vec<BigMapAction>,
    ) -> Result<(), StorageError>;

    // ── Reads (committed data only) ───────────────────────────────────────────

    /// Live state of big map `ptr` owned by `address` on `network`.
    async fn get_by_pointer(
        &self,
        address: &str,
        network: &str,
        ptr: i64,
    ) -> Result<Vec<BigMapDiff>, StorageError>;

    /// Every diff ever recorded for the big map, tombstones included.
    async fn history(
        &self,
        address: &str,
        network: &str,
        ptr: i64,
    ) -> Result<Vec<BigMapDiff>, StorageError>;

    /// Actions whose source or destination is `ptr`.
    async fn actions(
        &self,
        address: &str,
        network: &str,
        ptr: i64,
    ) -> Result<Vec<BigMapAction>, StorageError>;
}

/// Source of contract type expressions.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// Returns `Err(StorageError::SchemaNotFound)` for unknown contracts.
    async fn get(&self, address: &str) -> Result<ScriptRecord, StorageError>;
}
