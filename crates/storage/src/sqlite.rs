use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};

use gridlease_core::{ColumnLayout, FieldValue, Record, RecordKey};

use crate::error::StorageError;
use crate::traits::{LeaseRegistry, MAX_BULK_KEYS, PreferenceStore, RecordStore};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn record_exists(tx: &rusqlite::Transaction, key: &RecordKey) -> Result<bool, StorageError> {
    let found = tx
        .query_row(
            "SELECT 1 FROM records WHERE record_key = ?1",
            rusqlite::params![key.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write_fields(
    tx: &rusqlite::Transaction,
    key: &RecordKey,
    changes: &[(String, FieldValue)],
) -> Result<(), StorageError> {
    for (field_key, value) in changes {
        let bytes = value
            .to_msgpack()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tx.execute(
            "INSERT INTO fields (record_key, field_key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(record_key, field_key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key.as_str(), field_key, bytes],
        )?;
    }
    Ok(())
}

fn decode_value(bytes: &[u8]) -> Result<FieldValue, StorageError> {
    FieldValue::from_msgpack(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl RecordStore for SqliteStorage {
    fn fetch_all(&self) -> Result<Vec<Record>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.record_key, f.field_key, f.value
             FROM records r LEFT JOIN fields f ON f.record_key = r.record_key
             ORDER BY r.record_key, f.field_key",
        )?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let field_key: Option<String> = row.get(1)?;
            let value: Option<Vec<u8>> = row.get(2)?;
            Ok((key, field_key, value))
        })?;

        let mut records: Vec<Record> = Vec::new();
        for row in rows {
            let (key, field_key, value) = row?;
            let starts_new = records.last().is_none_or(|r| r.key.as_str() != key);
            if starts_new {
                records.push(Record {
                    key: RecordKey::new(key)?,
                    fields: BTreeMap::new(),
                });
            }
            if let (Some(field_key), Some(bytes), Some(record)) =
                (field_key, value, records.last_mut())
            {
                record.fields.insert(field_key, decode_value(&bytes)?);
            }
        }
        Ok(records)
    }

    fn get_record(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE record_key = ?1",
                rusqlite::params![key.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT field_key, value FROM fields WHERE record_key = ?1")?;
        let rows = stmt.query_map(rusqlite::params![key.as_str()], |row| {
            let field_key: String = row.get(0)?;
            let value: Vec<u8> = row.get(1)?;
            Ok((field_key, value))
        })?;

        let mut fields = BTreeMap::new();
        for row in rows {
            let (field_key, bytes) = row?;
            fields.insert(field_key, decode_value(&bytes)?);
        }
        Ok(Some(Record {
            key: key.clone(),
            fields,
        }))
    }

    fn find_records(&self, field: &str, needle: &str) -> Result<Vec<Record>, StorageError> {
        let needle = needle.to_lowercase();
        Ok(self
            .fetch_all()?
            .into_iter()
            .filter(|r| r.get(field).display_text().to_lowercase().contains(&needle))
            .collect())
    }

    fn insert_record(&mut self, record: &Record) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO records (record_key) VALUES (?1)",
            rusqlite::params![record.key.as_str()],
        )?;
        tx.execute(
            "DELETE FROM fields WHERE record_key = ?1",
            rusqlite::params![record.key.as_str()],
        )?;
        let changes: Vec<(String, FieldValue)> = record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        write_fields(&tx, &record.key, &changes)?;
        tx.commit()?;
        Ok(())
    }

    fn update_fields(
        &mut self,
        key: &RecordKey,
        changes: &[(String, FieldValue)],
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        if !record_exists(&tx, key)? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        write_fields(&tx, key, changes)?;
        tx.commit()?;
        Ok(())
    }

    fn update_many(
        &mut self,
        keys: &[RecordKey],
        changes: &[(String, FieldValue)],
    ) -> Result<(), StorageError> {
        if keys.len() > MAX_BULK_KEYS {
            return Err(StorageError::BulkLimit {
                requested: keys.len(),
                limit: MAX_BULK_KEYS,
            });
        }

        // Dropping the transaction on an early return rolls every key back.
        let tx = self.conn.transaction()?;
        for key in keys {
            if !record_exists(&tx, key)? {
                return Err(StorageError::NotFound(key.to_string()));
            }
            write_fields(&tx, key, changes)?;
        }
        tx.commit()?;
        tracing::debug!(count = keys.len(), "bulk update committed");
        Ok(())
    }
}

impl LeaseRegistry for SqliteStorage {
    fn set_active_edits(&mut self, active: bool) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE edit_state
             SET active_edits = ?1,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
             WHERE id = 1",
            rusqlite::params![active as i64],
        )?;
        tracing::debug!(active, "active_edits written");
        Ok(())
    }

    fn active_edits(&self) -> Result<bool, StorageError> {
        let active: i64 = self.conn.query_row(
            "SELECT active_edits FROM edit_state WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(active != 0)
    }
}

impl PreferenceStore for SqliteStorage {
    fn get_layout(&self, user_id: &str, view: &str) -> Result<Option<ColumnLayout>, StorageError> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT layout FROM column_preferences WHERE user_id = ?1 AND view_name = ?2",
                rusqlite::params![user_id, view],
                |row| row.get(0),
            )
            .optional()?;
        bytes
            .map(|b| {
                ColumnLayout::from_msgpack(&b)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn put_layout(
        &mut self,
        user_id: &str,
        view: &str,
        layout: &ColumnLayout,
    ) -> Result<(), StorageError> {
        let bytes = layout
            .to_msgpack()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO column_preferences (user_id, view_name, layout) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, view_name) DO UPDATE SET
                layout = excluded.layout,
                updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
            rusqlite::params![user_id, view, bytes],
        )?;
        Ok(())
    }
}
