use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("bulk update of {requested} records exceeds limit of {limit}")]
    BulkLimit { requested: usize, limit: usize },

    #[error("core error: {0}")]
    Core(#[from] gridlease_core::CoreError),
}
