use gridlease_core::{RecordKey, WriteId};
use gridlease_storage::StorageError;

use crate::config::SessionConfig;
use crate::edits::coerce;
use crate::effects::Effect;
use crate::error::EngineError;

/// Result of a select-all-on-page click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAll {
    /// Something was already selected, so everything was deselected.
    Cleared,
    Selected { count: usize, truncated: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkResolution {
    Applied { count: usize },
    Failed { message: String },
}

/// Records picked for a bulk field update, in the order they were picked.
#[derive(Debug, Clone)]
pub struct BulkSelection {
    keys: Vec<RecordKey>,
    limit: usize,
    in_flight: Option<(WriteId, usize)>,
}

impl BulkSelection {
    pub fn new(limit: usize) -> Self {
        Self {
            keys: Vec::new(),
            limit,
            in_flight: None,
        }
    }

    pub fn keys(&self) -> &[RecordKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Flip one record's checkbox. Adding past the limit is refused.
    pub fn toggle(&mut self, key: &RecordKey) -> Result<bool, EngineError> {
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
            return Ok(false);
        }
        if self.keys.len() >= self.limit {
            return Err(EngineError::BulkLimit { limit: self.limit });
        }
        self.keys.push(key.clone());
        Ok(true)
    }

    /// Header checkbox: deselect everything if anything is selected,
    /// otherwise select the page's rows up to the limit.
    pub fn select_all_on_page(&mut self, page_keys: &[RecordKey]) -> SelectAll {
        if !self.keys.is_empty() {
            self.keys.clear();
            return SelectAll::Cleared;
        }
        self.keys = page_keys.iter().take(self.limit).cloned().collect();
        let truncated = page_keys.len() > self.limit;
        if truncated {
            tracing::warn!(
                limit = self.limit,
                requested = page_keys.len(),
                "select all truncated"
            );
        }
        SelectAll::Selected {
            count: self.keys.len(),
            truncated,
        }
    }

    /// Build the single all-or-nothing write that sets `field` on every
    /// selected record.
    pub fn prepare(
        &mut self,
        config: &SessionConfig,
        field: &str,
        raw: &str,
    ) -> Result<Effect, EngineError> {
        if self.keys.is_empty() {
            return Err(EngineError::EmptyBulk);
        }
        if field == config.key_field {
            return Err(EngineError::KeyFieldImmutable(field.to_string()));
        }
        let value = coerce(config, field, raw)?.persisted;
        let id = WriteId::new();
        self.in_flight = Some((id, self.keys.len()));
        tracing::info!(count = self.keys.len(), field, "bulk update issued");
        Ok(Effect::PersistBulk {
            id,
            keys: self.keys.clone(),
            field: field.to_string(),
            value,
        })
    }

    pub fn complete(
        &mut self,
        write: WriteId,
        result: Result<(), StorageError>,
    ) -> Option<BulkResolution> {
        let (id, count) = self.in_flight?;
        if id != write {
            return None;
        }
        self.in_flight = None;
        match result {
            Ok(()) => {
                self.keys.clear();
                Some(BulkResolution::Applied { count })
            }
            Err(err) => {
                tracing::warn!("bulk update failed: {err}");
                Some(BulkResolution::Failed {
                    message: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<RecordKey> {
        (0..n)
            .map(|i| RecordKey::new(format!("K{i:02}")).unwrap())
            .collect()
    }

    #[test]
    fn toggle_rejects_eleventh_key() {
        let mut sel = BulkSelection::new(10);
        let all = keys(11);
        for k in &all[..10] {
            assert!(sel.toggle(k).unwrap());
        }
        let err = sel.toggle(&all[10]).unwrap_err();
        assert!(matches!(err, EngineError::BulkLimit { limit: 10 }));
        assert_eq!(sel.len(), 10);

        // Deselecting frees a slot.
        assert!(!sel.toggle(&all[0]).unwrap());
        assert!(sel.toggle(&all[10]).unwrap());
    }

    #[test]
    fn select_all_truncates_then_clears() {
        let mut sel = BulkSelection::new(10);
        let page = keys(20);
        assert_eq!(
            sel.select_all_on_page(&page),
            SelectAll::Selected {
                count: 10,
                truncated: true
            }
        );
        assert_eq!(sel.keys(), &page[..10]);
        assert_eq!(sel.select_all_on_page(&page), SelectAll::Cleared);
        assert!(sel.is_empty());

        assert_eq!(
            sel.select_all_on_page(&page[..4]),
            SelectAll::Selected {
                count: 4,
                truncated: false
            }
        );
    }

    #[test]
    fn prepare_requires_selection_and_coerces() {
        let config = SessionConfig::default();
        let mut sel = BulkSelection::new(10);
        assert!(matches!(
            sel.prepare(&config, "price", "5"),
            Err(EngineError::EmptyBulk)
        ));

        let page = keys(3);
        sel.select_all_on_page(&page);
        let effect = sel.prepare(&config, "price", "5").unwrap();
        match &effect {
            Effect::PersistBulk { keys, value, .. } => {
                assert_eq!(keys.len(), 3);
                assert_eq!(value, &gridlease_core::FieldValue::Number(5.0));
            }
            other => panic!("unexpected effect {other:?}"),
        }
        assert!(matches!(
            sel.prepare(&config, "partnumber", "x"),
            Err(EngineError::KeyFieldImmutable(_))
        ));
    }

    #[test]
    fn success_clears_and_failure_keeps_selection() {
        let config = SessionConfig::default();
        let mut sel = BulkSelection::new(10);
        sel.select_all_on_page(&keys(2));

        let failing = sel.prepare(&config, "brand", "Acme").unwrap();
        let resolution = sel.complete(failing.id(), Err(StorageError::Rejected("down".into())));
        assert!(matches!(resolution, Some(BulkResolution::Failed { .. })));
        assert_eq!(sel.len(), 2);

        let ok = sel.prepare(&config, "brand", "Acme").unwrap();
        assert_eq!(sel.complete(WriteId::new(), Ok(())), None);
        assert_eq!(
            sel.complete(ok.id(), Ok(())),
            Some(BulkResolution::Applied { count: 2 })
        );
        assert!(sel.is_empty());
    }
}
