//! tzindex-storage: persisted big-map history.
//!
//! Defines the write-once records produced by the lineage resolver
//! ([`BigMapDiff`], [`BigMapAction`]), the repository traits the resolver and
//! its callers depend on, an in-memory backend, and a conformance suite that
//! any backend can run against itself.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{BigMapAction, BigMapActionKind, BigMapDiff, Provenance, ScriptRecord};
pub use traits::{BigMapRepository, SchemaRepository};
