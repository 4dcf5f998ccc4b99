use std::future::Future;

use super::{commit_diffs, make_action, make_diff, TestResult, ADDRESS, NETWORK};
use crate::record::BigMapActionKind;
use crate::{BigMapRepository, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "duplicate_id_rejected",
            duplicate_id_rejected(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "failed_commit_writes_nothing",
            failed_commit_writes_nothing(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "actions_found_by_either_pointer",
            actions_found_by_either_pointer(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Records are write-once: committing an existing id fails.
async fn duplicate_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_diffs(&s, vec![make_diff("d1", 7, "exprA", Some(1), 10)]).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_diffs(&mut snap, vec![make_diff("d1", 7, "exprA", Some(2), 11)])
        .await
        .map_err(|e| e.to_string())?;
    match s.commit_snapshot(snap).await {
        Err(StorageError::DuplicateRecord { id }) if id == "d1" => Ok(()),
        Err(other) => Err(format!("expected DuplicateRecord(d1), got {}", other)),
        Ok(()) => Err("duplicate id was accepted".to_string()),
    }
}

/// A commit rejected for one record must not persist the others.
async fn failed_commit_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_diffs(&s, vec![make_diff("d1", 7, "exprA", Some(1), 10)]).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_diffs(
        &mut snap,
        vec![
            make_diff("d2", 7, "exprB", Some(2), 11),
            make_diff("d1", 7, "exprA", Some(3), 11),
        ],
    )
    .await
    .map_err(|e| e.to_string())?;
    if s.commit_snapshot(snap).await.is_ok() {
        return Err("commit with duplicate id succeeded".to_string());
    }

    let rows = s
        .history(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    if rows.len() != 1 {
        return Err(format!("expected 1 row, got {}", rows.len()));
    }
    Ok(())
}

async fn actions_found_by_either_pointer<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_actions(
        &mut snap,
        vec![
            make_action("a1", BigMapActionKind::Alloc, None, Some(5), 10),
            make_action("a2", BigMapActionKind::Copy, Some(5), Some(6), 11),
            make_action("a3", BigMapActionKind::Remove, Some(9), None, 12),
        ],
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let for_five = s
        .actions(ADDRESS, NETWORK, 5)
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = for_five.iter().map(|a| a.id.as_str()).collect();
    if ids != vec!["a1", "a2"] {
        return Err(format!("expected [a1, a2] for pointer 5, got {:?}", ids));
    }
    let for_six = s
        .actions(ADDRESS, NETWORK, 6)
        .await
        .map_err(|e| e.to_string())?;
    if for_six.len() != 1 || for_six[0].action != BigMapActionKind::Copy {
        return Err("expected the copy action for pointer 6".to_string());
    }
    Ok(())
}
