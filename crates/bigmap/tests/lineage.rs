//! Lineage scenarios over the in-memory backend.
//!
//! Each test feeds a raw `big_map_diff` log (as found in node RPC output)
//! through the parser or resolver and checks the records it emits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tzindex_ast::ContractSchema;
use tzindex_bigmap::{
    persist, LogEntry, NodeRpc, OperationContext, ResolveContext, ResolveError, Resolver,
    ResolverConfig, RichStorage, RpcError, StorageParser,
};
use tzindex_micheline::{from_json, Micheline};
use tzindex_storage::{
    BigMapActionKind, BigMapRepository, MemoryStorage, Provenance, ScriptRecord, StorageError,
};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

const CONTRACT: &str = "KT1ThEdxfUcWUwqsdergy3QnbCWGHSUHeHJq";

fn m(v: Value) -> Micheline {
    from_json(&v).unwrap()
}

/// `pair (big_map bytes nat) unit`
fn schema() -> ContractSchema {
    ContractSchema::from_record(&ScriptRecord {
        address: CONTRACT.to_string(),
        parameter: m(json!({"prim": "unit"})),
        storage: m(json!({"prim": "pair", "args": [
            {"prim": "big_map", "args": [{"prim": "bytes"}, {"prim": "nat"}]},
            {"prim": "unit"}
        ]})),
    })
    .unwrap()
}

fn op(id: &str, level: i64) -> OperationContext {
    OperationContext {
        provenance: Provenance {
            operation_id: id.to_string(),
            level,
            timestamp: "2021-01-01T00:00:00Z".to_string(),
            network: "mainnet".to_string(),
            protocol: "PsFLorenaUUuikDWvMDr6fGBRG8kt3e3D3fHoXK1j1BFRxeSH4i".to_string(),
        },
        source: "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx".to_string(),
        destination: CONTRACT.to_string(),
    }
}

fn transaction(storage: Value, log: Value) -> Value {
    json!({
        "kind": "transaction",
        "destination": CONTRACT,
        "metadata": {"operation_result": {
            "status": "applied",
            "storage": storage,
            "big_map_diff": log
        }}
    })
}

fn update(ptr: i64, key: &str, value: Option<&str>) -> LogEntry {
    LogEntry::Update {
        big_map: ptr,
        key: Micheline::bytes(key),
        key_hash: format!("expr{}", key),
        value: value.map(Micheline::int),
    }
}

fn alloc(ptr: i64) -> LogEntry {
    LogEntry::Alloc {
        big_map: ptr,
        key_type: m(json!({"prim": "bytes"})),
        value_type: m(json!({"prim": "nat"})),
    }
}

/// Resolve `log` directly, with the storage holding the given final pointers at `0/0`.
async fn resolve(
    repo: &MemoryStorage,
    pointers: &[i64],
    log: &[LogEntry],
) -> Result<tzindex_bigmap::Resolution, ResolveError> {
    let schema = schema();
    let config = ResolverConfig::default();
    let pointers: BTreeMap<i64, String> = pointers.iter().map(|p| (*p, "0/0".to_string())).collect();
    let op = op("opResolve", 20);
    let ctx = ResolveContext {
        storage_type: &schema.storage,
        pointers: &pointers,
        address: CONTRACT,
        provenance: &op.provenance,
    };
    Resolver::new(repo, &config).resolve(&ctx, log).await
}

/// Commit live records for `ptr` through the regular persistence path.
async fn seed(repo: &MemoryStorage, ptr: i64, keys: &[(&str, &str)]) {
    let log: Vec<LogEntry> = keys.iter().map(|(k, v)| update(ptr, k, Some(*v))).collect();
    let schema = schema();
    let config = ResolverConfig::default();
    let pointers = BTreeMap::from([(ptr, "0/0".to_string())]);
    let seed_op = op("opSeed", 1);
    let ctx = ResolveContext {
        storage_type: &schema.storage,
        pointers: &pointers,
        address: CONTRACT,
        provenance: &seed_op.provenance,
    };
    let resolution = Resolver::new(repo, &config).resolve(&ctx, &log).await.unwrap();
    persist(
        repo,
        &RichStorage {
            diffs: resolution.diffs,
            actions: resolution.actions,
            ..RichStorage::default()
        },
    )
    .await
    .unwrap();
}

struct FixedRpc {
    storage: Micheline,
    calls: AtomicUsize,
}

impl FixedRpc {
    fn new(storage: Value) -> Self {
        FixedRpc {
            storage: m(storage),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NodeRpc for FixedRpc {
    async fn get_script_storage(&self, address: &str, _level: i64) -> Result<Micheline, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if address == CONTRACT {
            Ok(self.storage.clone())
        } else {
            Err(RpcError::Unavailable(address.to_string()))
        }
    }
}

// ──────────────────────────────────────────────
// Temporary pointers
// ──────────────────────────────────────────────

#[tokio::test]
async fn copy_of_temporary_pointer_lands_on_destination() {
    let repo = MemoryStorage::new();
    let out = resolve(
        &repo,
        &[5],
        &[alloc(-1), update(-1, "00aa", Some("7")), LogEntry::Copy {
            source_big_map: -1,
            destination_big_map: 5,
        }],
    )
    .await
    .unwrap();

    assert_eq!(out.diffs.len(), 1);
    let diff = &out.diffs[0];
    assert_eq!(diff.ptr, 5);
    assert_eq!(diff.bin_path, "0/0");
    assert_eq!(diff.key, Micheline::bytes("00aa"));
    assert_eq!(diff.key_hash, "expr00aa");
    assert_eq!(diff.value, Some(Micheline::int(7)));

    assert_eq!(out.actions.len(), 1);
    let action = &out.actions[0];
    assert_eq!(action.action, BigMapActionKind::Copy);
    assert_eq!(action.source_ptr, None);
    assert_eq!(action.destination_ptr, Some(5));
}

#[tokio::test]
async fn removed_temporary_pointer_leaves_no_trace() {
    let repo = MemoryStorage::new();
    let out = resolve(
        &repo,
        &[],
        &[alloc(-1), LogEntry::Remove { big_map: -1 }],
    )
    .await
    .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn chained_temporary_copies_resolve_through_the_chain() {
    let repo = MemoryStorage::new();
    let out = resolve(
        &repo,
        &[9],
        &[
            alloc(-1),
            update(-1, "01", Some("1")),
            LogEntry::Copy {
                source_big_map: -1,
                destination_big_map: -2,
            },
            update(-2, "02", Some("2")),
            LogEntry::Copy {
                source_big_map: -2,
                destination_big_map: 9,
            },
        ],
    )
    .await
    .unwrap();
    let keys: Vec<&str> = out.diffs.iter().map(|d| d.key_hash.as_str()).collect();
    assert_eq!(keys, vec!["expr01", "expr02"]);
    assert!(out.diffs.iter().all(|d| d.ptr == 9));
}

#[tokio::test]
async fn update_of_unknown_temporary_pointer_fails() {
    let repo = MemoryStorage::new();
    let err = resolve(&repo, &[], &[update(-3, "00", Some("1"))])
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::UnresolvedPointer { ptr: -3 });
}

// ──────────────────────────────────────────────
// Final pointers
// ──────────────────────────────────────────────

#[tokio::test]
async fn remove_tombstones_live_records() {
    let repo = MemoryStorage::new();
    seed(&repo, 7, &[("01", "10"), ("02", "20")]).await;

    let out = resolve(&repo, &[], &[LogEntry::Remove { big_map: 7 }])
        .await
        .unwrap();
    assert_eq!(out.diffs.len(), 2);
    for (diff, hash) in out.diffs.iter().zip(["expr01", "expr02"]) {
        assert_eq!(diff.ptr, 7);
        assert_eq!(diff.key_hash, hash);
        assert!(diff.is_removed());
        assert_eq!(diff.provenance.operation_id, "opResolve");
    }
    assert_eq!(out.actions[0].action, BigMapActionKind::Remove);
    assert_eq!(out.actions[0].source_ptr, Some(7));

    persist(
        &repo,
        &RichStorage {
            diffs: out.diffs,
            actions: out.actions,
            ..RichStorage::default()
        },
    )
    .await
    .unwrap();
    assert!(repo.get_by_pointer(CONTRACT, "mainnet", 7).await.unwrap().is_empty());
    assert_eq!(repo.history(CONTRACT, "mainnet", 7).await.unwrap().len(), 4);
}

#[tokio::test]
async fn copy_through_temporary_keeps_final_origin() {
    let repo = MemoryStorage::new();
    seed(&repo, 3, &[("01", "1")]).await;

    let out = resolve(
        &repo,
        &[3, 4],
        &[
            LogEntry::Copy {
                source_big_map: 3,
                destination_big_map: -1,
            },
            update(-1, "05", Some("5")),
            LogEntry::Copy {
                source_big_map: -1,
                destination_big_map: 4,
            },
        ],
    )
    .await
    .unwrap();

    assert_eq!(out.actions.len(), 1);
    assert_eq!(out.actions[0].action, BigMapActionKind::Copy);
    assert_eq!(out.actions[0].source_ptr, Some(3));
    assert_eq!(out.actions[0].destination_ptr, Some(4));

    let keys: Vec<&str> = out.diffs.iter().map(|d| d.key_hash.as_str()).collect();
    assert_eq!(keys, vec!["expr01", "expr05"]);
    assert!(out.diffs.iter().all(|d| d.ptr == 4 && d.bin_path == "0/0"));
}

#[tokio::test]
async fn copy_from_final_pointer_merges_history_and_pending() {
    let repo = MemoryStorage::new();
    seed(&repo, 3, &[("01", "1"), ("02", "2")]).await;

    let out = resolve(
        &repo,
        &[3, 4],
        &[
            update(3, "02", None),
            update(3, "03", Some("3")),
            LogEntry::Copy {
                source_big_map: 3,
                destination_big_map: 4,
            },
        ],
    )
    .await
    .unwrap();

    let copied: Vec<&str> = out
        .diffs
        .iter()
        .filter(|d| d.ptr == 4)
        .map(|d| d.key_hash.as_str())
        .collect();
    assert_eq!(copied, vec!["expr01", "expr03"]);
    assert_eq!(out.actions[0].source_ptr, Some(3));
    assert_eq!(out.actions[0].destination_ptr, Some(4));
}

// ──────────────────────────────────────────────
// Parsers
// ──────────────────────────────────────────────

#[tokio::test]
async fn transaction_with_alloc_and_update() {
    let repo = MemoryStorage::new();
    let rpc = FixedRpc::new(json!({"prim": "Unit"}));
    let config = ResolverConfig::default();
    let content = transaction(
        json!({"prim": "Pair", "args": [{"int": "10"}, {"prim": "Unit"}]}),
        json!([
            {"action": "alloc", "big_map": "10", "key_type": {"prim": "bytes"}, "value_type": {"prim": "nat"}},
            {"action": "update", "big_map": "10", "key_hash": "exprtZBwZUeYYYfUs9B9Rg2ywHezVHnCCnmF9WsDQVrs582dSK63dC",
             "key": {"bytes": "0011"}, "value": {"int": "5"}}
        ]),
    );

    let mut parser = StorageParser::new(&repo, &rpc, &config);
    let out = parser
        .parse_transaction(&content, &schema(), &op("opTx", 100))
        .await
        .unwrap();

    assert!(!out.empty);
    assert_eq!(out.diffs.len(), 1);
    assert_eq!(out.diffs[0].ptr, 10);
    assert_eq!(out.diffs[0].bin_path, "0/0");
    assert_eq!(out.diffs[0].key, Micheline::bytes("0011"));
    assert_eq!(out.diffs[0].value, Some(Micheline::int(5)));
    assert_eq!(out.diffs[0].address, CONTRACT);

    assert_eq!(out.actions.len(), 1);
    assert_eq!(out.actions[0].action, BigMapActionKind::Alloc);
    assert_eq!(out.actions[0].destination_ptr, Some(10));
    assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);

    persist(&repo, &out).await.unwrap();
    assert_eq!(repo.get_by_pointer(CONTRACT, "mainnet", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn origination_falls_back_to_node_storage() {
    let repo = MemoryStorage::new();
    let rpc = FixedRpc::new(json!({"prim": "Pair", "args": [{"int": "11"}, {"prim": "Unit"}]}));
    let content = json!({
        "kind": "origination",
        "script": {"storage": {"prim": "Pair", "args": [[], {"prim": "Unit"}]}},
        "metadata": {"operation_result": {
            "status": "applied",
            "originated_contracts": [CONTRACT],
            "big_map_diff": [
                {"action": "update", "big_map": "11", "key_hash": "expr", "key": {"bytes": "ff"}, "value": {"int": "1"}}
            ]
        }}
    });

    let config = ResolverConfig::default();
    let mut parser = StorageParser::new(&repo, &rpc, &config);
    let out = parser
        .parse_origination(&content, &schema(), &op("opOrig", 50))
        .await
        .unwrap();
    assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);
    assert_eq!(out.diffs[0].ptr, 11);
    assert_eq!(out.diffs[0].bin_path, "0/0");
    assert_eq!(
        out.storage,
        Some(m(json!({"prim": "Pair", "args": [{"int": "11"}, {"prim": "Unit"}]})))
    );

    let strict = ResolverConfig {
        rpc_fallback: false,
        ..ResolverConfig::default()
    };
    let mut parser = StorageParser::new(&repo, &rpc, &strict);
    let err = parser
        .parse_origination(&content, &schema(), &op("opOrig", 50))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnknownStoragePath { .. }));
}

#[tokio::test]
async fn simulation_reads_top_level_content() {
    let repo = MemoryStorage::new();
    let rpc = FixedRpc::new(json!({"prim": "Unit"}));
    let config = ResolverConfig::default();
    let content = json!({
        "storage": {"prim": "Pair", "args": [{"int": "2"}, {"prim": "Unit"}]},
        "big_map_diff": [
            {"action": "update", "big_map": 2, "key_hash": "expr", "key": {"bytes": "01"}}
        ]
    });
    let mut parser = StorageParser::simulation(&repo, &rpc, &config);
    let out = parser
        .parse_transaction(&content, &schema(), &op("opSim", 5))
        .await
        .unwrap();
    assert_eq!(out.diffs.len(), 1);
    assert!(out.diffs[0].is_removed());
    assert_eq!(out.diffs[0].address, CONTRACT);
}

#[tokio::test]
async fn transaction_without_log_is_empty() {
    let repo = MemoryStorage::new();
    let rpc = FixedRpc::new(json!({"prim": "Unit"}));
    let config = ResolverConfig::default();
    let content = transaction(
        json!({"prim": "Pair", "args": [{"int": "10"}, {"prim": "Unit"}]}),
        json!([]),
    );
    let mut parser = StorageParser::new(&repo, &rpc, &config);
    let out = parser
        .parse_transaction(&content, &schema(), &op("opTx", 100))
        .await
        .unwrap();
    assert!(out.empty);
    assert!(out.diffs.is_empty() && out.actions.is_empty());
}

// ──────────────────────────────────────────────
// Persistence
// ──────────────────────────────────────────────

#[tokio::test]
async fn replayed_group_is_rejected_without_partial_writes() {
    let repo = MemoryStorage::new();
    seed(&repo, 1, &[("01", "1")]).await;
    assert_eq!(repo.diff_count(), 1);

    // Same operation and ordinals produce the same ids.
    let schema = schema();
    let config = ResolverConfig::default();
    let pointers = BTreeMap::from([(1, "0/0".to_string())]);
    let seed_op = op("opSeed", 1);
    let ctx = ResolveContext {
        storage_type: &schema.storage,
        pointers: &pointers,
        address: CONTRACT,
        provenance: &seed_op.provenance,
    };
    let replay = Resolver::new(&repo, &config)
        .resolve(&ctx, &[update(1, "01", Some("1")), update(1, "02", Some("2"))])
        .await
        .unwrap();
    let err = persist(
        &repo,
        &RichStorage {
            diffs: replay.diffs,
            ..RichStorage::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Storage(StorageError::DuplicateRecord { .. })
    ));
    assert_eq!(repo.diff_count(), 1);
}
