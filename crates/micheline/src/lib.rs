//! tzindex-micheline: the Micheline wire grammar.
//!
//! Provides the [`Micheline`] tree (`{"prim", "args", "annots"}`, `{"int"}`,
//! `{"string"}`, `{"bytes"}` and sequences), annotation helpers, the table of
//! primitive names, and decoders for the packed binary forms of addresses,
//! keys, key hashes, signatures and chain ids.
//!
//! Every other tzindex crate consumes wire data through this crate, then
//! builds its own typed representation on top.

pub mod deserialize;
pub mod encoding;
pub mod prim;
pub mod types;

pub use deserialize::{from_json, from_str, MichelineError};
pub use encoding::{
    decode_address, decode_chain_id, decode_key_hash, decode_public_key, decode_signature,
};
pub use types::{Annotations, Micheline, PrimNode};
