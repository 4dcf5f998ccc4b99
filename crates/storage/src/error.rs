/// All errors that can be returned by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A record with this id was already persisted. Records are write-once.
    #[error("duplicate record id: {id}")]
    DuplicateRecord { id: String },

    /// No script is stored for the contract.
    #[error("schema not found for contract {address}")]
    SchemaNotFound { address: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
