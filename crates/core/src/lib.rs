pub mod clock;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod layout;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use layout::{ColumnLayout, SortDirection, SortSpec};
pub use record::{Record, RecordKey};
