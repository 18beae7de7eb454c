use gridlease_core::{ColumnLayout, FieldValue, Record, RecordKey};

use crate::error::StorageError;

/// Largest key set a single bulk update may name.
pub const MAX_BULK_KEYS: usize = 10;

/// Keyed table of catalog records shared by every session and the batch consumer.
pub trait RecordStore {
    /// Every record, in key order. There is no store-side pagination.
    fn fetch_all(&self) -> Result<Vec<Record>, StorageError>;

    fn get_record(&self, key: &RecordKey) -> Result<Option<Record>, StorageError>;

    /// Records whose `field` display text contains `needle`, case-insensitively.
    fn find_records(&self, field: &str, needle: &str) -> Result<Vec<Record>, StorageError>;

    /// Create or replace a record. Record lifecycle belongs to the store's
    /// owners; grid sessions never call this.
    fn insert_record(&mut self, record: &Record) -> Result<(), StorageError>;

    /// Set fields on one record. Fails with `NotFound` if the key is unknown.
    fn update_fields(
        &mut self,
        key: &RecordKey,
        changes: &[(String, FieldValue)],
    ) -> Result<(), StorageError>;

    /// Set the same fields on up to [`MAX_BULK_KEYS`] records. All or nothing.
    fn update_many(
        &mut self,
        keys: &[RecordKey],
        changes: &[(String, FieldValue)],
    ) -> Result<(), StorageError>;
}

/// The shared `active_edits` flag. It carries no owner and no expiry:
/// any writer may set it either way and the last write wins.
pub trait LeaseRegistry {
    fn set_active_edits(&mut self, active: bool) -> Result<(), StorageError>;

    /// Read side, used by the batch consumer.
    fn active_edits(&self) -> Result<bool, StorageError>;
}

pub trait PreferenceStore {
    fn get_layout(&self, user_id: &str, view: &str) -> Result<Option<ColumnLayout>, StorageError>;

    fn put_layout(
        &mut self,
        user_id: &str,
        view: &str,
        layout: &ColumnLayout,
    ) -> Result<(), StorageError>;
}

/// Everything a grid session talks to.
pub trait GridBackend: RecordStore + LeaseRegistry + PreferenceStore {}

impl<T: RecordStore + LeaseRegistry + PreferenceStore> GridBackend for T {}
