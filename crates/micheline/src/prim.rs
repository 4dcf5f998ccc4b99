//! Primitive names used by the type and value grammar.

// ──────────────────────────────────────────────
// Type constructors
// ──────────────────────────────────────────────

pub const INT: &str = "int";
pub const NAT: &str = "nat";
pub const STRING: &str = "string";
pub const BYTES: &str = "bytes";
pub const BOOL: &str = "bool";
pub const UNIT: &str = "unit";
pub const MUTEZ: &str = "mutez";
pub const TIMESTAMP: &str = "timestamp";
pub const ADDRESS: &str = "address";
pub const KEY: &str = "key";
pub const KEY_HASH: &str = "key_hash";
pub const SIGNATURE: &str = "signature";
pub const CHAIN_ID: &str = "chain_id";
pub const OPERATION: &str = "operation";
pub const NEVER: &str = "never";
pub const BLS12_381_FR: &str = "bls12_381_fr";
pub const BLS12_381_G1: &str = "bls12_381_g1";
pub const BLS12_381_G2: &str = "bls12_381_g2";
pub const SAPLING_STATE: &str = "sapling_state";
pub const SAPLING_TRANSACTION: &str = "sapling_transaction";
pub const CONTRACT: &str = "contract";
pub const TICKET: &str = "ticket";
pub const OPTION: &str = "option";
pub const PAIR: &str = "pair";
pub const OR: &str = "or";
pub const LIST: &str = "list";
pub const SET: &str = "set";
pub const MAP: &str = "map";
pub const BIG_MAP: &str = "big_map";
pub const LAMBDA: &str = "lambda";

// ──────────────────────────────────────────────
// Data constructors
// ──────────────────────────────────────────────

pub const D_PAIR: &str = "Pair";
pub const D_LEFT: &str = "Left";
pub const D_RIGHT: &str = "Right";
pub const D_SOME: &str = "Some";
pub const D_NONE: &str = "None";
pub const D_TRUE: &str = "True";
pub const D_FALSE: &str = "False";
pub const D_UNIT: &str = "Unit";
pub const D_ELT: &str = "Elt";

// ──────────────────────────────────────────────
// Script sections
// ──────────────────────────────────────────────

pub const PARAMETER: &str = "parameter";
pub const STORAGE: &str = "storage";
pub const CODE: &str = "code";

/// Entry point name used when a parameter has a single unnamed alternative.
pub const DEFAULT_ENTRYPOINT: &str = "default";

/// Annotation prefixes.
pub const FIELD_PREFIX: char = '%';
pub const TYPE_PREFIX: char = ':';
pub const VAR_PREFIX: char = '@';
