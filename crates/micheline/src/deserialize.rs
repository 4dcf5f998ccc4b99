//! Parsing wire JSON into [`Micheline`] trees.

use crate::types::Micheline;

/// Errors while reading wire data or its packed binary forms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MichelineError {
    /// The JSON is not a Micheline node.
    #[error("invalid micheline: {0}")]
    InvalidJson(String),

    /// A `bytes` literal is not valid hex.
    #[error("invalid hex string '{value}'")]
    InvalidHex { value: String },

    /// A packed value has the wrong byte length for its kind.
    #[error("invalid {kind} length: expected {expected} bytes, got {got}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    /// A packed value starts with an unknown tag byte.
    #[error("unknown {kind} tag: {tag:#04x}")]
    UnknownTag { kind: &'static str, tag: u8 },
}

/// Parse a `serde_json::Value` into a Micheline tree.
pub fn from_json(value: &serde_json::Value) -> Result<Micheline, MichelineError> {
    serde_json::from_value(value.clone()).map_err(|e| MichelineError::InvalidJson(e.to_string()))
}

/// Parse a JSON string into a Micheline tree.
pub fn from_str(s: &str) -> Result<Micheline, MichelineError> {
    serde_json::from_str(s).map_err(|e| MichelineError::InvalidJson(e.to_string()))
}
