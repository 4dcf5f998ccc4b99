use tzindex_ast::EngineError;
use tzindex_storage::StorageError;

/// Failures of the node RPC collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("no storage for {address} at level {level}")]
    NotFound { address: String, level: i64 },

    #[error("node unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort the resolution of one operation group.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A temporary pointer has no chain entry, or its chain is too long.
    #[error("unresolved big map pointer {ptr}")]
    UnresolvedPointer { ptr: i64 },

    /// No big-map schema at the structural path.
    #[error("no big map type at storage path '{path}'")]
    UnknownStoragePath { path: String },

    /// The mutation log or operation content is malformed.
    #[error("invalid operation content: {message}")]
    InvalidLog { message: String },

    /// `ResolverConfig` could not be read or parsed.
    #[error("invalid resolver config: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl ResolveError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ResolveError::InvalidLog {
            message: message.into(),
        }
    }
}
