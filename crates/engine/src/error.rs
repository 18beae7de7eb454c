use gridlease_core::CoreError;
use gridlease_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("record not loaded: {0}")]
    RecordNotFound(String),

    #[error("key field {0} cannot be edited")]
    KeyFieldImmutable(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("{field} expects a number, got {raw:?}")]
    NotNumeric { field: String, raw: String },

    #[error("at most {limit} records can be selected for a bulk update")]
    BulkLimit { limit: usize },

    #[error("no records selected for bulk update")]
    EmptyBulk,

    #[error("edit mode is not enabled")]
    EditModeDisabled,

    #[error("session is not mounted")]
    NotMounted,

    #[error("invalid config: {0}")]
    Config(String),
}
