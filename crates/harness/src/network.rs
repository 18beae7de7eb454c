use gridlease_core::{FieldValue, ManualClock, Record, RecordKey};
use gridlease_engine::{Effect, Outcome, SessionConfig, deliver, execute, run_effects};
use gridlease_storage::{LeaseRegistry, RecordStore, SqliteStorage, StorageError};

use crate::{FaultyStore, TestPeer};

pub const VIEW: &str = "products_page";

/// Several sessions sharing one store and one clock.
pub struct TestNetwork {
    pub clock: ManualClock,
    pub store: FaultyStore<SqliteStorage>,
    config: SessionConfig,
    peers: Vec<TestPeer>,
}

impl TestNetwork {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Result<Self, StorageError> {
        Ok(Self {
            clock: ManualClock::new(1_700_000_000_000),
            store: FaultyStore::new(SqliteStorage::open_in_memory()?),
            config,
            peers: Vec::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn seed(&mut self, records: &[Record]) -> Result<(), StorageError> {
        for record in records {
            self.store.insert_record(record)?;
        }
        Ok(())
    }

    /// `count` products `P-000`, `P-001`, ... with a description and a price.
    pub fn seed_products(&mut self, count: usize) -> Result<(), StorageError> {
        let key_field = self.config.key_field.clone();
        let records: Vec<Record> = (0..count)
            .map(|i| {
                let key = RecordKey::new(format!("P-{i:03}"))?;
                Ok(Record::new(&key_field, key)
                    .with_field("description", format!("Product {i}"))
                    .with_field("price", (i as f64) * 1.5 + 1.0))
            })
            .collect::<Result<_, gridlease_core::CoreError>>()?;
        self.seed(&records)
    }

    /// Add a session without mounting it.
    pub fn add_peer(&mut self, user_id: &str) -> usize {
        self.peers
            .push(TestPeer::new(self.config.clone(), &self.clock, user_id, VIEW));
        self.peers.len() - 1
    }

    /// Add a session, mount it and run its initial load.
    pub fn open_peer(&mut self, user_id: &str) -> usize {
        let index = self.add_peer(user_id);
        self.peers[index].session.mount();
        self.run(index);
        index
    }

    pub fn peer(&self, index: usize) -> &TestPeer {
        &self.peers[index]
    }

    pub fn peer_mut(&mut self, index: usize) -> &mut TestPeer {
        &mut self.peers[index]
    }

    /// Execute the peer's queued effects in order until it is quiet.
    pub fn run(&mut self, index: usize) -> usize {
        run_effects(&mut self.peers[index].session, &mut self.store)
    }

    /// Drain queued effects without executing them, for reordering tests.
    pub fn take(&mut self, index: usize) -> Vec<Effect> {
        self.peers[index].session.take_effects()
    }

    pub fn execute(&mut self, effect: &Effect) -> Outcome {
        execute(&mut self.store, effect)
    }

    pub fn deliver(&mut self, index: usize, outcome: Outcome) {
        deliver(&mut self.peers[index].session, outcome);
    }

    /// Advance the clock one second at a time, polling every peer and
    /// running whatever each produces.
    pub fn advance_secs(&mut self, secs: u64) {
        for _ in 0..secs {
            self.clock.advance_secs(1);
            self.poll_all();
        }
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.clock.advance_ms(ms);
        self.poll_all();
    }

    fn poll_all(&mut self) {
        for index in 0..self.peers.len() {
            self.peers[index].session.poll();
            self.run(index);
        }
    }

    pub fn lease_flag(&self) -> Result<bool, StorageError> {
        self.store.active_edits()
    }

    pub fn stored(&self, key: &str, field: &str) -> Result<FieldValue, Box<dyn std::error::Error>> {
        let record = self
            .store
            .get_record(&RecordKey::new(key)?)?
            .ok_or_else(|| format!("record {key} not stored"))?;
        Ok(record.get(field).clone())
    }
}
