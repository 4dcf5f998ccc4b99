use std::future::Future;

use super::{commit_diffs, make_diff, TestResult, ADDRESS, NETWORK};
use crate::BigMapRepository;

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "history",
            "latest_record_per_key_wins",
            latest_record_per_key_wins(factory).await,
        ),
        TestResult::from_result(
            "history",
            "tombstone_hides_key",
            tombstone_hides_key(factory).await,
        ),
        TestResult::from_result(
            "history",
            "filters_by_pointer_address_and_network",
            filters_by_pointer_address_and_network(factory).await,
        ),
        TestResult::from_result(
            "history",
            "history_keeps_tombstones_in_level_order",
            history_keeps_tombstones_in_level_order(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Two updates of the same key: only the later one is live.
async fn latest_record_per_key_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_diffs(&s, vec![make_diff("d1", 7, "exprA", Some(1), 10)]).await?;
    commit_diffs(&s, vec![make_diff("d2", 7, "exprA", Some(2), 11)]).await?;

    let live = s
        .get_by_pointer(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    if live.len() != 1 {
        return Err(format!("expected 1 live record, got {}", live.len()));
    }
    if live[0].id != "d2" {
        return Err(format!("expected d2 to be live, got {}", live[0].id));
    }
    Ok(())
}

/// A deletion record removes the key from the live state.
async fn tombstone_hides_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_diffs(
        &s,
        vec![
            make_diff("d1", 7, "exprA", Some(1), 10),
            make_diff("d2", 7, "exprB", Some(2), 10),
        ],
    )
    .await?;
    commit_diffs(&s, vec![make_diff("d3", 7, "exprA", None, 12)]).await?;

    let live = s
        .get_by_pointer(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    let hashes: Vec<&str> = live.iter().map(|d| d.key_hash.as_str()).collect();
    if hashes != vec!["exprB"] {
        return Err(format!("expected only exprB live, got {:?}", hashes));
    }
    Ok(())
}

async fn filters_by_pointer_address_and_network<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut other_address = make_diff("d2", 7, "exprB", Some(2), 10);
    other_address.address = "KT1Other".to_string();
    let mut other_network = make_diff("d3", 7, "exprC", Some(3), 10);
    other_network.provenance.network = "ghostnet".to_string();
    commit_diffs(
        &s,
        vec![
            make_diff("d1", 7, "exprA", Some(1), 10),
            other_address,
            other_network,
            make_diff("d4", 8, "exprD", Some(4), 10),
        ],
    )
    .await?;

    let live = s
        .get_by_pointer(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    if live.len() != 1 || live[0].id != "d1" {
        let ids: Vec<&str> = live.iter().map(|d| d.id.as_str()).collect();
        return Err(format!("expected [d1], got {:?}", ids));
    }
    Ok(())
}

async fn history_keeps_tombstones_in_level_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_diffs(&s, vec![make_diff("late", 7, "exprA", None, 20)]).await?;
    commit_diffs(&s, vec![make_diff("early", 7, "exprA", Some(1), 10)]).await?;

    let rows = s
        .history(ADDRESS, NETWORK, 7)
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = rows.iter().map(|d| d.id.as_str()).collect();
    if ids != vec!["early", "late"] {
        return Err(format!("expected [early, late], got {:?}", ids));
    }
    Ok(())
}
