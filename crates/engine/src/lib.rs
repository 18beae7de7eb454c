pub mod bulk;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod edits;
pub mod effects;
pub mod error;
pub mod layout;
pub mod lease;
pub mod navigation;
pub mod session;

pub use bulk::{BulkResolution, BulkSelection, SelectAll};
pub use config::{ColumnSpec, SessionConfig};
pub use dataset::{FieldFilter, FilterSet, GridDataset};
pub use driver::{Outcome, deliver, execute, run_effects};
pub use edits::{EditController, EditResolution, PendingEdit, SaveStatus};
pub use effects::{Delivery, Effect, LeaseReason, LoadedView};
pub use error::EngineError;
pub use layout::{DropPosition, FixedAdvance, TextMeasure};
pub use lease::{EditLeaseCoordinator, LeaseEvent, LeaseState};
pub use navigation::{CellPos, GridBounds, NavKey, NavOutcome, NavState, Navigator};
pub use session::GridSession;
