//! Optimistic cell edits: apply locally, persist, roll back on failure.

use std::collections::HashMap;

use gridlease_core::{FieldValue, RecordKey, WriteId};
use gridlease_storage::StorageError;

use crate::config::SessionConfig;
use crate::dataset::GridDataset;
use crate::effects::Effect;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saving,
    Saved,
    Error,
}

/// Value to show in the grid and value to persist for one raw input.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub cached: FieldValue,
    pub persisted: FieldValue,
}

/// Turn raw editor text into typed values. Numeric fields parse as floats;
/// a blank numeric input shows as empty text and persists as null.
pub fn coerce(config: &SessionConfig, field: &str, raw: &str) -> Result<Coerced, EngineError> {
    if !config.is_numeric(field) {
        let text = FieldValue::Text(raw.to_string());
        return Ok(Coerced {
            cached: text.clone(),
            persisted: text,
        });
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Coerced {
            cached: FieldValue::Text(String::new()),
            persisted: FieldValue::Null,
        });
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Coerced {
            cached: FieldValue::Number(n),
            persisted: FieldValue::Number(n),
        }),
        _ => Err(EngineError::NotNumeric {
            field: field.to_string(),
            raw: raw.to_string(),
        }),
    }
}

/// Save state of one (record, field) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub key: RecordKey,
    pub field: String,
    pub new_value: FieldValue,
    /// Last confirmed value, restored if the write fails.
    pub previous_value: FieldValue,
    pub write: Option<WriteId>,
    pub status: SaveStatus,
    pub error: Option<String>,
    pub clear_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditResolution {
    Saved {
        key: RecordKey,
        field: String,
    },
    RolledBack {
        key: RecordKey,
        field: String,
        message: String,
    },
}

type CellKey = (RecordKey, String);

#[derive(Debug, Default)]
pub struct EditController {
    pending: HashMap<CellKey, PendingEdit>,
    by_write: HashMap<WriteId, CellKey>,
}

impl EditController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `raw` to the cached record and return the write to persist it.
    ///
    /// A commit to a cell whose previous write is still in flight supersedes
    /// it: the earlier outcome will be ignored and the rollback target stays
    /// the value from before the first commit.
    pub fn commit(
        &mut self,
        config: &SessionConfig,
        dataset: &mut GridDataset,
        key: &RecordKey,
        field: &str,
        raw: &str,
        now_ms: u64,
    ) -> Result<Effect, EngineError> {
        if field == config.key_field {
            return Err(EngineError::KeyFieldImmutable(field.to_string()));
        }
        let Some(record) = dataset.record(key) else {
            return Err(EngineError::RecordNotFound(key.to_string()));
        };
        let current = record.get(field).clone();
        let cell = (key.clone(), field.to_string());

        let coerced = match coerce(config, field, raw) {
            Ok(c) => c,
            Err(err) => {
                // An in-flight write keeps its entry so a failure can still roll it back.
                if self.pending.get(&cell).is_some_and(|p| p.status == SaveStatus::Saving) {
                    tracing::debug!(%key, field, "rejected non-numeric input during in-flight save");
                    return Err(err);
                }
                self.pending.insert(
                    cell,
                    PendingEdit {
                        key: key.clone(),
                        field: field.to_string(),
                        new_value: current.clone(),
                        previous_value: current,
                        write: None,
                        status: SaveStatus::Error,
                        error: Some(err.to_string()),
                        clear_at: None,
                    },
                );
                tracing::debug!(%key, field, "rejected non-numeric input");
                return Err(err);
            }
        };

        let previous_value = match self.pending.get(&cell) {
            Some(prior) if prior.status == SaveStatus::Saving => {
                tracing::debug!(%key, field, "superseding in-flight write");
                prior.previous_value.clone()
            }
            _ => current,
        };
        self.forget(&cell);

        let edited_at = FieldValue::Timestamp(now_ms as i64);
        dataset.patch(
            key,
            field,
            coerced.cached.clone(),
            Some((config.timestamp_field.as_str(), edited_at.clone())),
        );

        let write = WriteId::new();
        self.by_write.insert(write, cell.clone());
        self.pending.insert(
            cell,
            PendingEdit {
                key: key.clone(),
                field: field.to_string(),
                new_value: coerced.cached,
                previous_value,
                write: Some(write),
                status: SaveStatus::Saving,
                error: None,
                clear_at: None,
            },
        );
        tracing::debug!(%key, field, ?write, "optimistic edit applied");

        Ok(Effect::PersistField {
            id: write,
            key: key.clone(),
            field: field.to_string(),
            value: coerced.persisted,
            stamp_field: config.timestamp_field.clone(),
            edited_at,
        })
    }

    /// Feed back the outcome of a `PersistField`. Returns `None` for writes
    /// this controller does not track, including superseded ones.
    pub fn complete(
        &mut self,
        write: WriteId,
        result: Result<(), StorageError>,
        dataset: &mut GridDataset,
        now_ms: u64,
        saved_badge_ms: u64,
    ) -> Option<EditResolution> {
        let cell = self.by_write.remove(&write)?;
        let entry = self.pending.get_mut(&cell)?;
        match result {
            Ok(()) => {
                entry.status = SaveStatus::Saved;
                entry.previous_value = entry.new_value.clone();
                entry.clear_at = Some(now_ms + saved_badge_ms);
                entry.write = None;
                tracing::debug!(key = %entry.key, field = %entry.field, "edit saved");
                Some(EditResolution::Saved {
                    key: entry.key.clone(),
                    field: entry.field.clone(),
                })
            }
            Err(err) => {
                let message = err.to_string();
                dataset.patch(&entry.key, &entry.field, entry.previous_value.clone(), None);
                entry.new_value = entry.previous_value.clone();
                entry.status = SaveStatus::Error;
                entry.error = Some(message.clone());
                entry.write = None;
                tracing::warn!(key = %entry.key, field = %entry.field, "edit rolled back: {message}");
                Some(EditResolution::RolledBack {
                    key: entry.key.clone(),
                    field: entry.field.clone(),
                    message,
                })
            }
        }
    }

    /// Clear "saved" badges whose display time has passed.
    pub fn poll(&mut self, now_ms: u64) {
        self.pending
            .retain(|_, e| !(e.status == SaveStatus::Saved && e.clear_at.is_some_and(|t| t <= now_ms)));
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.values().filter_map(|e| e.clear_at).min()
    }

    pub fn status(&self, key: &RecordKey, field: &str) -> Option<SaveStatus> {
        self.entry(key, field).map(|e| e.status)
    }

    pub fn entry(&self, key: &RecordKey, field: &str) -> Option<&PendingEdit> {
        self.pending.get(&(key.clone(), field.to_string()))
    }

    /// True while `write` is the newest write for its cell.
    pub fn owns(&self, write: WriteId) -> bool {
        self.by_write.contains_key(&write)
    }

    pub fn in_flight(&self) -> usize {
        self.by_write.len()
    }

    fn forget(&mut self, cell: &CellKey) {
        if let Some(write) = self.pending.remove(cell).and_then(|old| old.write) {
            self.by_write.remove(&write);
        }
    }
}
