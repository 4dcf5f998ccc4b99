//! tzindex-bigmap: big-map mutation lineage.
//!
//! Walks the `big_map_diff` log of an operation group, resolves temporary
//! pointers to final ones, normalizes keys and values through the storage
//! type, and produces the [`BigMapDiff`](tzindex_storage::BigMapDiff) and
//! [`BigMapAction`](tzindex_storage::BigMapAction) records to persist.
//!
//! One [`Resolver`] serves one operation group and is never shared between
//! groups.

mod arena;
pub mod config;
mod enrich;
mod error;
pub mod log;
mod parser;
mod persist;
mod pointers;
mod resolver;

pub use config::ResolverConfig;
pub use enrich::{enrich_storage, enriched_tree};
pub use error::{ResolveError, RpcError};
pub use log::LogEntry;
pub use parser::{NodeRpc, OperationContext, RichStorage, StorageParser};
pub use persist::persist;
pub use pointers::{find_big_map_pointers, schema_at};
pub use resolver::{Resolution, ResolveContext, Resolver};
