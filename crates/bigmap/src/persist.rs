use tracing::debug;
use tzindex_storage::{BigMapRepository, StorageError};

use crate::error::ResolveError;
use crate::parser::RichStorage;

/// Write the records of one operation group through a single snapshot.
///
/// A failed insert aborts the snapshot, so nothing from the group is
/// committed.
pub async fn persist<R: BigMapRepository>(
    repo: &R,
    storage: &RichStorage,
) -> Result<(), ResolveError> {
    if storage.diffs.is_empty() && storage.actions.is_empty() {
        return Ok(());
    }
    let mut snapshot = repo.begin_snapshot().await?;
    if let Err(e) = stage(repo, &mut snapshot, storage).await {
        repo.abort_snapshot(snapshot).await?;
        return Err(e.into());
    }
    repo.commit_snapshot(snapshot).await?;
    debug!(
        diffs = storage.diffs.len(),
        actions = storage.actions.len(),
        "persisted big map records"
    );
    Ok(())
}

async fn stage<R: BigMapRepository>(
    repo: &R,
    snapshot: &mut R::Snapshot,
    storage: &RichStorage,
) -> Result<(), StorageError> {
    repo.insert_diffs(snapshot, storage.diffs.clone()).await?;
    repo.insert_actions(snapshot, storage.actions.clone()).await
}
