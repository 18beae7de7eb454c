use gridlease_core::{FieldValue, ManualClock, RecordKey};
use gridlease_engine::{CellPos, GridSession, SessionConfig};

/// One browser tab: a grid session on the shared clock.
pub struct TestPeer {
    pub user_id: String,
    pub session: GridSession,
}

impl TestPeer {
    pub fn new(config: SessionConfig, clock: &ManualClock, user_id: &str, view: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            session: GridSession::new(config, Box::new(clock.clone()), user_id, view),
        }
    }

    /// Position of (`key`, `field`) on the current page, if visible.
    pub fn cell_of(&self, key: &str, field: &str) -> Option<CellPos> {
        let row = self
            .session
            .visible_rows()
            .iter()
            .position(|r| r.key.as_str() == key)?;
        let col = self.session.layout().position(field)?;
        Some(CellPos::new(row, col))
    }

    /// Cached value of one field as this session currently shows it.
    pub fn cached(&self, key: &str, field: &str) -> Option<FieldValue> {
        let key = RecordKey::new(key).ok()?;
        self.session
            .dataset()
            .record(&key)
            .map(|r| r.get(field).clone())
    }

    /// Keys of the current page in display order.
    pub fn visible_keys(&self) -> Vec<String> {
        self.session
            .visible_rows()
            .iter()
            .map(|r| r.key.to_string())
            .collect()
    }
}
