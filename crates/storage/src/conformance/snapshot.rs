use std::future::Future;

use super::{make_diff, TestResult, ADDRESS, NETWORK};
use crate::BigMapRepository;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_diffs_invisible",
            uncommitted_diffs_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "aborted_diffs_discarded",
            aborted_diffs_discarded(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn uncommitted_diffs_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_diffs(&mut snap, vec![make_diff("d1", 7, "exprA", Some(1), 10)])
        .await
        .map_err(|e| e.to_string())?;

    let live = s
        .get_by_pointer(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    if !live.is_empty() {
        return Err(format!(
            "staged diff visible before commit ({} rows)",
            live.len()
        ));
    }

    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    let live = s
        .get_by_pointer(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    if live.len() != 1 {
        return Err(format!("expected 1 row after commit, got {}", live.len()));
    }
    Ok(())
}

async fn aborted_diffs_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_diffs(&mut snap, vec![make_diff("d1", 7, "exprA", Some(1), 10)])
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rows = s
        .history(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    if !rows.is_empty() {
        return Err(format!("aborted diff persisted ({} rows)", rows.len()));
    }
    Ok(())
}
