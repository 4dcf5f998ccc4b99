//! Storage parsers for applied and simulated operations.
//!
//! An applied operation carries its result under
//! `metadata.operation_result`; a simulation returns storage and
//! `big_map_diff` at the top level of the content.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use tzindex_ast::{ContractSchema, TypeTree};
use tzindex_micheline::{from_json, Micheline};
use tzindex_storage::{BigMapAction, BigMapDiff, BigMapRepository, Provenance};

use crate::config::ResolverConfig;
use crate::error::{ResolveError, RpcError};
use crate::log::LogEntry;
use crate::pointers::find_big_map_pointers;
use crate::resolver::{ResolveContext, Resolver};

/// Node RPC calls the parsers may fall back to.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Contract storage as of `level`.
    async fn get_script_storage(&self, address: &str, level: i64) -> Result<Micheline, RpcError>;
}

/// Operation metadata the parsers need besides the content itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationContext {
    pub provenance: Provenance,
    pub source: String,
    pub destination: String,
}

/// Parsed storage of one operation plus the big-map records it produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichStorage {
    pub diffs: Vec<BigMapDiff>,
    pub actions: Vec<BigMapAction>,
    pub storage: Option<Micheline>,
    /// The operation carried no big-map log.
    pub empty: bool,
}

pub struct StorageParser<'a, R, P> {
    resolver: Resolver<'a, R>,
    rpc: &'a P,
    config: &'a ResolverConfig,
    simulate: bool,
}

impl<'a, R: BigMapRepository, P: NodeRpc> StorageParser<'a, R, P> {
    pub fn new(repo: &'a R, rpc: &'a P, config: &'a ResolverConfig) -> Self {
        StorageParser {
            resolver: Resolver::new(repo, config),
            rpc,
            config,
            simulate: false,
        }
    }

    /// Parser for simulation responses (`run_operation` style content).
    pub fn simulation(repo: &'a R, rpc: &'a P, config: &'a ResolverConfig) -> Self {
        StorageParser {
            simulate: true,
            ..Self::new(repo, rpc, config)
        }
    }

    pub async fn parse_transaction(
        &mut self,
        content: &Value,
        schema: &ContractSchema,
        op: &OperationContext,
    ) -> Result<RichStorage, ResolveError> {
        let (address, result) = if self.simulate {
            (op.destination.clone(), content)
        } else {
            let address = content
                .get("destination")
                .and_then(Value::as_str)
                .ok_or_else(|| ResolveError::invalid("transaction without destination"))?;
            (address.to_string(), operation_result(content)?)
        };

        let raw = micheline_field(result, "storage")?;
        let storage = if self.simulate {
            raw
        } else {
            normalize_storage(&schema.storage, &raw)?
        };

        let log = big_map_diff(result);
        let mut out = RichStorage {
            empty: log.is_empty(),
            ..RichStorage::default()
        };
        if !out.empty {
            let pointers = find_big_map_pointers(&schema.storage, &storage)?;
            self.run(&schema.storage, &pointers, &address, op, log, &mut out)
                .await?;
        }
        out.storage = Some(storage);
        Ok(out)
    }

    pub async fn parse_origination(
        &mut self,
        content: &Value,
        schema: &ContractSchema,
        op: &OperationContext,
    ) -> Result<RichStorage, ResolveError> {
        let (address, result) = if self.simulate {
            (op.source.clone(), content)
        } else {
            let result = operation_result(content)?;
            let address = result
                .pointer("/originated_contracts/0")
                .and_then(Value::as_str)
                .ok_or_else(|| ResolveError::invalid("origination without originated contract"))?;
            (address.to_string(), result)
        };

        let script_storage = content
            .pointer("/script/storage")
            .ok_or_else(|| ResolveError::invalid("origination without script storage"))?;
        let mut storage =
            from_json(script_storage).map_err(|e| ResolveError::Engine(e.into()))?;

        let log = big_map_diff(result);
        if log.is_empty() {
            return Ok(RichStorage {
                storage: Some(storage),
                empty: true,
                ..RichStorage::default()
            });
        }

        let pointers = match find_big_map_pointers(&schema.storage, &storage) {
            Ok(found) if !found.is_empty() => found,
            found if !self.config.rpc_fallback || self.simulate => found?,
            _ => {
                warn!(
                    address = address.as_str(),
                    level = op.provenance.level,
                    "big map pointers not found in script storage, fetching from node"
                );
                storage = self
                    .rpc
                    .get_script_storage(&address, op.provenance.level)
                    .await?;
                find_big_map_pointers(&schema.storage, &storage)?
            }
        };

        let mut out = RichStorage {
            storage: Some(storage),
            ..RichStorage::default()
        };
        self.run(&schema.storage, &pointers, &address, op, log, &mut out)
            .await?;
        Ok(out)
    }

    async fn run(
        &mut self,
        storage_type: &TypeTree,
        pointers: &BTreeMap<i64, String>,
        address: &str,
        op: &OperationContext,
        log: &[Value],
        out: &mut RichStorage,
    ) -> Result<(), ResolveError> {
        let entries = LogEntry::parse_all(log, self.config.strict_actions)?;
        let ctx = ResolveContext {
            storage_type,
            pointers,
            address,
            provenance: &op.provenance,
        };
        let resolution = self.resolver.resolve(&ctx, &entries).await?;
        out.diffs.extend(resolution.diffs);
        out.actions.extend(resolution.actions);
        Ok(())
    }
}

fn operation_result(content: &Value) -> Result<&Value, ResolveError> {
    content
        .pointer("/metadata/operation_result")
        .ok_or_else(|| ResolveError::invalid("operation without result"))
}

fn micheline_field(value: &Value, field: &str) -> Result<Micheline, ResolveError> {
    let raw = value
        .get(field)
        .ok_or_else(|| ResolveError::invalid(format!("missing '{}'", field)))?;
    from_json(raw).map_err(|e| ResolveError::Engine(e.into()))
}

fn big_map_diff(result: &Value) -> &[Value] {
    result
        .get("big_map_diff")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Re-encode a storage value through its type.
fn normalize_storage(storage_type: &TypeTree, raw: &Micheline) -> Result<Micheline, ResolveError> {
    let mut tree = storage_type.clone();
    tree.settle_value(raw)?;
    Ok(tree.to_wire(false)?)
}
