use gridlease_core::{ColumnLayout, FieldValue, Record, RecordKey, WriteId};

/// Why a lease flag write was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseReason {
    /// Clearing a possibly stale flag when a session mounts.
    MountReset,
    Acquire,
    Heartbeat,
    /// Edit mode switched off by the user.
    Disabled,
    /// Edit mode forced off by a filter change.
    Filtered,
    /// The edit-mode countdown ran out.
    Expired,
    Teardown,
    Unload,
}

impl LeaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MountReset => "mount_reset",
            Self::Acquire => "acquire",
            Self::Heartbeat => "heartbeat",
            Self::Disabled => "disabled",
            Self::Filtered => "filtered",
            Self::Expired => "expired",
            Self::Teardown => "teardown",
            Self::Unload => "unload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The outcome is reported back through `complete_write`.
    Awaited,
    /// Issued and forgotten. The host may be gone before it lands and
    /// nobody hears about failure.
    BestEffort,
}

/// An I/O request produced by a session for its host to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadView {
        id: WriteId,
        user_id: String,
        view: String,
    },
    PersistField {
        id: WriteId,
        key: RecordKey,
        field: String,
        value: FieldValue,
        stamp_field: String,
        edited_at: FieldValue,
    },
    PersistBulk {
        id: WriteId,
        keys: Vec<RecordKey>,
        field: String,
        value: FieldValue,
    },
    SetLeaseFlag {
        id: WriteId,
        active: bool,
        reason: LeaseReason,
        delivery: Delivery,
    },
    SavePreferences {
        id: WriteId,
        user_id: String,
        view: String,
        layout: ColumnLayout,
    },
}

impl Effect {
    pub fn id(&self) -> WriteId {
        match self {
            Effect::LoadView { id, .. }
            | Effect::PersistField { id, .. }
            | Effect::PersistBulk { id, .. }
            | Effect::SetLeaseFlag { id, .. }
            | Effect::SavePreferences { id, .. } => *id,
        }
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(
            self,
            Effect::SetLeaseFlag {
                delivery: Delivery::BestEffort,
                ..
            }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Effect::LoadView { .. } => "load_view",
            Effect::PersistField { .. } => "persist_field",
            Effect::PersistBulk { .. } => "persist_bulk",
            Effect::SetLeaseFlag { .. } => "set_lease_flag",
            Effect::SavePreferences { .. } => "save_preferences",
        }
    }
}

/// Result of a `LoadView` effect: the full record set plus any saved layout.
#[derive(Debug, Clone, Default)]
pub struct LoadedView {
    pub records: Vec<Record>,
    pub saved_layout: Option<ColumnLayout>,
}
