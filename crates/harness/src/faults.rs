use gridlease_core::{ColumnLayout, FieldValue, Record, RecordKey};
use gridlease_storage::{LeaseRegistry, PreferenceStore, RecordStore, StorageError};

/// Which calls should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub loads: bool,
    pub updates: bool,
    pub bulk_updates: bool,
    pub lease_writes: bool,
    pub preference_writes: bool,
}

/// Wraps a backend, failing selected calls and recording every lease flag write.
pub struct FaultyStore<S> {
    inner: S,
    pub faults: Faults,
    lease_log: Vec<bool>,
    update_count: usize,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Faults::default(),
            lease_log: Vec::new(),
            update_count: 0,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Every value passed to `set_active_edits` that reached the store, in order.
    pub fn lease_log(&self) -> &[bool] {
        &self.lease_log
    }

    pub fn clear_lease_log(&mut self) {
        self.lease_log.clear();
    }

    /// Successful single-record updates.
    pub fn update_count(&self) -> usize {
        self.update_count
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Rejected(format!("injected {what} failure"))
}

impl<S: RecordStore> RecordStore for FaultyStore<S> {
    fn fetch_all(&self) -> Result<Vec<Record>, StorageError> {
        if self.faults.loads {
            return Err(injected("load"));
        }
        self.inner.fetch_all()
    }

    fn get_record(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        self.inner.get_record(key)
    }

    fn find_records(&self, field: &str, needle: &str) -> Result<Vec<Record>, StorageError> {
        self.inner.find_records(field, needle)
    }

    fn insert_record(&mut self, record: &Record) -> Result<(), StorageError> {
        self.inner.insert_record(record)
    }

    fn update_fields(
        &mut self,
        key: &RecordKey,
        changes: &[(String, FieldValue)],
    ) -> Result<(), StorageError> {
        if self.faults.updates {
            return Err(injected("update"));
        }
        self.inner.update_fields(key, changes)?;
        self.update_count += 1;
        Ok(())
    }

    fn update_many(
        &mut self,
        keys: &[RecordKey],
        changes: &[(String, FieldValue)],
    ) -> Result<(), StorageError> {
        if self.faults.bulk_updates {
            return Err(injected("bulk update"));
        }
        self.inner.update_many(keys, changes)
    }
}

impl<S: LeaseRegistry> LeaseRegistry for FaultyStore<S> {
    fn set_active_edits(&mut self, active: bool) -> Result<(), StorageError> {
        if self.faults.lease_writes {
            return Err(injected("lease"));
        }
        self.inner.set_active_edits(active)?;
        self.lease_log.push(active);
        Ok(())
    }

    fn active_edits(&self) -> Result<bool, StorageError> {
        self.inner.active_edits()
    }
}

impl<S: PreferenceStore> PreferenceStore for FaultyStore<S> {
    fn get_layout(&self, user_id: &str, view: &str) -> Result<Option<ColumnLayout>, StorageError> {
        self.inner.get_layout(user_id, view)
    }

    fn put_layout(
        &mut self,
        user_id: &str,
        view: &str,
        layout: &ColumnLayout,
    ) -> Result<(), StorageError> {
        if self.faults.preference_writes {
            return Err(injected("preference"));
        }
        self.inner.put_layout(user_id, view, layout)
    }
}
