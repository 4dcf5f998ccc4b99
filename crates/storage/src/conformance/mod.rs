//! Conformance test suite for `BigMapRepository` implementations.
//!
//! This module provides a backend-agnostic test suite that any backend can
//! run to verify correctness. The suite covers:
//!
//! - **Live state**: latest record per key, tombstones hide keys, filtering
//! - **Snapshot isolation**: uncommitted writes invisible, aborted writes discarded
//! - **Atomic commit**: write-once ids, all-or-nothing commit, action lookup
//!
//! # Usage
//!
//! ```ignore
//! use tzindex_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod history;
mod snapshot;

use std::fmt;
use std::future::Future;

use tzindex_micheline::Micheline;

use crate::record::{BigMapAction, BigMapActionKind, BigMapDiff, Provenance};
use crate::BigMapRepository;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "history", "snapshot", "commit").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: BigMapRepository,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(history::run_history_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const ADDRESS: &str = "KT1ConformanceContract";
const NETWORK: &str = "mainnet";

fn provenance(operation_id: &str, level: i64) -> Provenance {
    Provenance {
        operation_id: operation_id.to_string(),
        level,
        timestamp: "2025-01-01T00:00:00Z".to_string(),
        network: NETWORK.to_string(),
        protocol: "PtConformance".to_string(),
    }
}

fn make_diff(id: &str, ptr: i64, key_hash: &str, value: Option<i64>, level: i64) -> BigMapDiff {
    BigMapDiff {
        id: id.to_string(),
        ptr,
        key: Micheline::string(key_hash),
        key_hash: key_hash.to_string(),
        key_strings: vec![key_hash.to_string()],
        value: value.map(Micheline::int),
        value_strings: vec![],
        bin_path: "0/0".to_string(),
        address: ADDRESS.to_string(),
        provenance: provenance(&format!("op-{}", level), level),
    }
}

fn make_action(
    id: &str,
    action: BigMapActionKind,
    source_ptr: Option<i64>,
    destination_ptr: Option<i64>,
    level: i64,
) -> BigMapAction {
    BigMapAction {
        id: id.to_string(),
        action,
        source_ptr,
        destination_ptr,
        address: ADDRESS.to_string(),
        provenance: provenance(&format!("op-{}", level), level),
    }
}

/// Insert and commit `diffs` in one snapshot.
async fn commit_diffs<S: BigMapRepository>(s: &S, diffs: Vec<BigMapDiff>) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_diffs(&mut snap, diffs)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}
