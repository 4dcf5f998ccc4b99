//! Big-map lineage resolution for one operation group.
//!
//! Temporary pointers (`<= -1`) live only inside the group. Records touched
//! under them are replayed in memory when they are copied into a final
//! pointer; only final pointers reach the returned records.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use tracing::debug;
use tzindex_ast::{Node, NodeKind, TypeTree};
use tzindex_micheline::Micheline;
use tzindex_storage::{
    BigMapAction, BigMapActionKind, BigMapDiff, BigMapRepository, Provenance,
};

use crate::arena::{ChainLink, PointerArena};
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::log::LogEntry;
use crate::pointers::schema_at;

/// Records produced by resolving a mutation log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub diffs: Vec<BigMapDiff>,
    pub actions: Vec<BigMapAction>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty() && self.actions.is_empty()
    }

    pub fn extend(&mut self, other: Resolution) {
        self.diffs.extend(other.diffs);
        self.actions.extend(other.actions);
    }
}

/// The contract and operation a mutation log belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub storage_type: &'a TypeTree,
    /// Final pointers found in the post-operation storage, by path.
    pub pointers: &'a BTreeMap<i64, String>,
    pub address: &'a str,
    pub provenance: &'a Provenance,
}

struct Normalized {
    key: Micheline,
    key_strings: Vec<String>,
    value: Option<Micheline>,
    value_strings: Vec<String>,
}

/// Resolver state for one operation group. Reuse the instance for every
/// operation of the group so temporary pointers carry over.
pub struct Resolver<'a, R> {
    repo: &'a R,
    config: &'a ResolverConfig,
    arena: PointerArena,
    ordinal: u64,
}

impl<'a, R: BigMapRepository> Resolver<'a, R> {
    pub fn new(repo: &'a R, config: &'a ResolverConfig) -> Self {
        Resolver {
            repo,
            config,
            arena: PointerArena::default(),
            ordinal: 0,
        }
    }

    /// Run every entry in log order. The first failing entry aborts the
    /// whole log.
    pub async fn resolve(
        &mut self,
        ctx: &ResolveContext<'_>,
        entries: &[LogEntry],
    ) -> Result<Resolution, ResolveError> {
        let mut out = Resolution::default();
        for entry in entries {
            debug!(action = entry.kind(), address = ctx.address, "resolving big map action");
            match entry {
                LogEntry::Alloc {
                    big_map,
                    key_type,
                    value_type,
                } => self.alloc(ctx, *big_map, key_type, value_type, &mut out)?,
                LogEntry::Update {
                    big_map,
                    key,
                    key_hash,
                    value,
                } => self.update(ctx, *big_map, key, key_hash, value.as_ref(), &mut out)?,
                LogEntry::Copy {
                    source_big_map,
                    destination_big_map,
                } => {
                    self.copy(ctx, *source_big_map, *destination_big_map, &mut out)
                        .await?
                }
                LogEntry::Remove { big_map } => self.remove(ctx, *big_map, &mut out).await?,
            }
        }
        Ok(out)
    }

    // ──────────────────────────────────────────────
    // Handlers
    // ──────────────────────────────────────────────

    fn alloc(
        &mut self,
        ctx: &ResolveContext<'_>,
        ptr: i64,
        key_type: &Micheline,
        value_type: &Micheline,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        let link = ChainLink {
            source: None,
            path: None,
            key_type: Some(tzindex_ast::parse_type(key_type)?),
            value_type: Some(tzindex_ast::parse_type(value_type)?),
        };
        self.arena.open(ptr, link);
        if ptr >= 0 {
            out.actions
                .push(self.action(ctx, BigMapActionKind::Alloc, None, Some(ptr)));
        }
        Ok(())
    }

    fn update(
        &mut self,
        ctx: &ResolveContext<'_>,
        ptr: i64,
        key: &Micheline,
        key_hash: &str,
        value: Option<&Micheline>,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        let located = if ptr < 0 { self.resolve_source(ptr)? } else { ptr };
        let path = self.pointer_path(ctx, located);
        if let Some(path) = &path {
            self.arena.set_path(ptr, path);
        }

        let (key_type, value_type) = self.big_map_types(ctx, ptr, path.as_deref())?;
        let normalized = normalize(&key_type, &value_type, key, value)?;
        let record = BigMapDiff {
            id: self.next_id(ctx, "update", ptr, key_hash),
            ptr,
            key: normalized.key,
            key_hash: key_hash.to_string(),
            key_strings: normalized.key_strings,
            value: normalized.value,
            value_strings: normalized.value_strings,
            bin_path: path.unwrap_or_default(),
            address: ctx.address.to_string(),
            provenance: ctx.provenance.clone(),
        };
        self.arena.push(ptr, record.clone());
        if ptr >= 0 {
            out.diffs.push(record);
        }
        Ok(())
    }

    async fn copy(
        &mut self,
        ctx: &ResolveContext<'_>,
        src: i64,
        dst: i64,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        if dst >= 0 {
            let source = if src >= 0 { src } else { self.resolve_source(src)? };
            let source = (source >= 0).then_some(source);
            out.actions
                .push(self.action(ctx, BigMapActionKind::Copy, source, Some(dst)));
        }

        let records = self.live_records(ctx, src).await?;

        let path = self
            .pointer_path(ctx, src)
            .or_else(|| self.pointer_path(ctx, dst));
        let types = self.big_map_types(ctx, src, path.as_deref()).ok();
        if path.is_none() && types.is_none() {
            return Err(ResolveError::UnresolvedPointer { ptr: dst });
        }
        self.arena.set_link(
            dst,
            ChainLink {
                source: Some(src),
                path,
                key_type: types.as_ref().map(|(k, _)| k.clone()),
                value_type: types.map(|(_, v)| v),
            },
        );

        self.arena.touch(dst);
        let bin_path = self.pointer_path(ctx, dst).unwrap_or_default();
        for record in records {
            let copied = BigMapDiff {
                id: self.next_id(ctx, "copy", dst, &record.key_hash),
                ptr: dst,
                bin_path: bin_path.clone(),
                address: ctx.address.to_string(),
                provenance: ctx.provenance.clone(),
                ..record
            };
            self.arena.push(dst, copied.clone());
            if dst >= 0 {
                out.diffs.push(copied);
            }
        }
        Ok(())
    }

    async fn remove(
        &mut self,
        ctx: &ResolveContext<'_>,
        ptr: i64,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        if ptr < 0 {
            self.arena.discard(ptr);
            return Ok(());
        }
        for record in self.live_records(ctx, ptr).await? {
            let tombstone = BigMapDiff {
                id: self.next_id(ctx, "remove", ptr, &record.key_hash),
                value: None,
                value_strings: Vec::new(),
                provenance: ctx.provenance.clone(),
                ..record
            };
            self.arena.push(ptr, tombstone.clone());
            out.diffs.push(tombstone);
        }
        out.actions
            .push(self.action(ctx, BigMapActionKind::Remove, Some(ptr), None));
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Lookups
    // ──────────────────────────────────────────────

    /// Follow the temporary chain from `ptr` to a final pointer, or to the
    /// allocation that started it.
    pub(crate) fn resolve_source(&self, ptr: i64) -> Result<i64, ResolveError> {
        let mut current = ptr;
        let mut steps = 0usize;
        while current < 0 {
            let link = self
                .arena
                .link(current)
                .ok_or(ResolveError::UnresolvedPointer { ptr: current })?;
            match link.source {
                None => break,
                Some(source) => {
                    steps += 1;
                    if steps > self.config.max_chain_length {
                        return Err(ResolveError::UnresolvedPointer { ptr });
                    }
                    current = source;
                }
            }
        }
        Ok(current)
    }

    fn pointer_path(&self, ctx: &ResolveContext<'_>, ptr: i64) -> Option<String> {
        ctx.pointers
            .get(&ptr)
            .cloned()
            .or_else(|| self.arena.link(ptr).and_then(|l| l.path.clone()))
    }

    /// Key and value types from the storage schema at `path`, else the ones
    /// captured when `ptr` was allocated.
    fn big_map_types(
        &self,
        ctx: &ResolveContext<'_>,
        ptr: i64,
        path: Option<&str>,
    ) -> Result<(Node, Node), ResolveError> {
        if let Some(node) = path.and_then(|p| schema_at(ctx.storage_type, p)) {
            if let NodeKind::BigMap { key, value, .. } = &node.kind {
                return Ok(((**key).clone(), (**value).clone()));
            }
        }
        match self.arena.link(ptr) {
            Some(ChainLink {
                key_type: Some(key),
                value_type: Some(value),
                ..
            }) => Ok((key.clone(), value.clone())),
            _ => Err(ResolveError::UnknownStoragePath {
                path: path.unwrap_or_default().to_string(),
            }),
        }
    }

    /// Live records of `ptr`: persisted history for final pointers, plus
    /// whatever this group touched. Later records win per key hash.
    async fn live_records(
        &self,
        ctx: &ResolveContext<'_>,
        ptr: i64,
    ) -> Result<Vec<BigMapDiff>, ResolveError> {
        let pending = self.arena.records(ptr);
        let persisted = if ptr >= 0 {
            self.repo
                .get_by_pointer(ctx.address, &ctx.provenance.network, ptr)
                .await?
        } else if pending.is_none() {
            return Err(ResolveError::UnresolvedPointer { ptr });
        } else {
            Vec::new()
        };

        let mut order = Vec::new();
        let mut latest: HashMap<String, BigMapDiff> = HashMap::new();
        let pending = pending.unwrap_or_default().iter().cloned();
        for record in persisted.into_iter().chain(pending) {
            if !latest.contains_key(&record.key_hash) {
                order.push(record.key_hash.clone());
            }
            latest.insert(record.key_hash.clone(), record);
        }
        Ok(order
            .into_iter()
            .filter_map(|hash| latest.remove(&hash))
            .filter(|record| !record.is_removed())
            .collect())
    }

    // ──────────────────────────────────────────────
    // Record construction
    // ──────────────────────────────────────────────

    fn action(
        &mut self,
        ctx: &ResolveContext<'_>,
        kind: BigMapActionKind,
        source_ptr: Option<i64>,
        destination_ptr: Option<i64>,
    ) -> BigMapAction {
        let ptr = destination_ptr.or(source_ptr).unwrap_or_default();
        BigMapAction {
            id: self.next_id(ctx, kind.as_str(), ptr, ""),
            action: kind,
            source_ptr,
            destination_ptr,
            address: ctx.address.to_string(),
            provenance: ctx.provenance.clone(),
        }
    }

    /// Deterministic record id, so replaying a group yields the same ids.
    fn next_id(&mut self, ctx: &ResolveContext<'_>, kind: &str, ptr: i64, key_hash: &str) -> String {
        self.ordinal += 1;
        let mut hasher = Sha256::new();
        hasher.update(ctx.provenance.network.as_bytes());
        hasher.update(ctx.provenance.operation_id.as_bytes());
        hasher.update(ctx.provenance.level.to_be_bytes());
        hasher.update(ctx.address.as_bytes());
        hasher.update(kind.as_bytes());
        hasher.update(ptr.to_be_bytes());
        hasher.update(key_hash.as_bytes());
        hasher.update(self.ordinal.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Re-express a raw key and value through their big-map types.
fn normalize(
    key_type: &Node,
    value_type: &Node,
    key: &Micheline,
    value: Option<&Micheline>,
) -> Result<Normalized, ResolveError> {
    let mut key_node = key_type.clone();
    key_node.settle(key)?;
    let mut normalized = Normalized {
        key: key_node.to_wire(false)?,
        key_strings: key_node.collect_strings()?,
        value: None,
        value_strings: Vec::new(),
    };
    if let Some(value) = value {
        let mut value_node = value_type.clone();
        value_node.settle(value)?;
        normalized.value = Some(value_node.to_wire(false)?);
        normalized.value_strings = value_node.collect_strings()?;
    }
    Ok(normalized)
}
