//! tzindex-ast: typed value engine over Micheline.
//!
//! Parses a type expression into a [`TypeTree`] of [`Node`]s, binds ("settles")
//! a wire value against it, and offers the output transforms built on a
//! settled tree: rendering, wire re-encoding, form schemas, type docs,
//! comparison and diffing, and big-map enrichment.
//!
//! Each node kind is a variant of the closed [`NodeKind`] enum and every
//! traversal is one exhaustive `match`.

mod compare;
pub mod docs;
mod error;
pub mod form;
pub mod interface;
pub mod metadata;
mod node;
mod render;
mod schema;
mod settle;
mod tree;
mod wire;

pub use docs::{EntrypointType, Typedef, TypedefArg, DOCS_FULL};
pub use error::EngineError;
pub use form::{FormSchema, FormType, SCHEMA_KEY};
pub use interface::{ContractInterface, InterfaceRegistry};
pub use metadata::{Metadata, NodeMetadata, Shape};
pub use node::{parse_type, parse_type_at, Node, NodeKind, ScalarPrim, Side};
pub use render::{DiffType, RenderNode};
pub use schema::ContractSchema;
pub use tree::{Entrypoint, TypeTree};
