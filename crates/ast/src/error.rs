use tzindex_micheline::MichelineError;

/// Errors raised by the typed value engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A wire node uses a primitive the engine does not recognise.
    #[error("unknown constructor '{prim}'")]
    UnknownConstructor { prim: String },

    /// Settling or parsing saw the wrong number of children.
    #[error("arity mismatch at {context}: expected {expected}, got {got}")]
    ArityMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    /// Compare or diff called on structurally different trees.
    #[error("values of type '{left}' and '{right}' are not comparable")]
    NotComparable { left: String, right: String },

    /// A wire literal of the wrong shape for its type.
    #[error("invalid value for '{prim}': expected {expected}")]
    ValueMismatch { prim: String, expected: String },

    /// A form field is missing or malformed.
    #[error("invalid form value for '{field}': {message}")]
    InvalidFormValue { field: String, message: String },

    /// An output transform was called on a node that was never settled.
    #[error("node at {path} has no value")]
    Unsettled { path: String },

    #[error(transparent)]
    Decode(#[from] MichelineError),
}

impl EngineError {
    pub(crate) fn arity(expected: usize, got: usize, context: impl Into<String>) -> Self {
        EngineError::ArityMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    pub(crate) fn mismatch(prim: impl Into<String>, expected: impl Into<String>) -> Self {
        EngineError::ValueMismatch {
            prim: prim.into(),
            expected: expected.into(),
        }
    }
}
