//! Edit-mode lease over the shared `active_edits` flag.
//!
//! While a session is in edit mode it keeps the flag asserted `true` so the
//! batch consumer stays away from the records. The flag carries no owner and
//! writes are unconditional, so the last writer wins: a second session's
//! mount reset or release can clear the flag under an active editor.
//!
//! Timers are deadline based. `poll` walks every one-second countdown tick
//! and every heartbeat due up to `now`, ticks first when they coincide, so a
//! host that polls late still sees each event exactly once.

use std::collections::HashMap;

use gridlease_core::WriteId;
use gridlease_storage::StorageError;

use crate::effects::{Delivery, Effect, LeaseReason};

const TICK_MS: u64 = 1_000;
/// Countdown value at or below which hosts should warn the user.
pub const WARN_BELOW_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Released,
    Acquiring(WriteId),
    Held,
    Releasing(WriteId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaseEvent {
    Acquired,
    AcquireFailed { message: String },
    Released,
    /// Outcome for a heartbeat, mount reset or superseded write.
    Ignored,
}

#[derive(Debug)]
pub struct EditLeaseCoordinator {
    state: LeaseState,
    window_secs: u32,
    heartbeat_ms: u64,
    remaining_secs: u32,
    next_tick_at: Option<u64>,
    next_heartbeat_at: Option<u64>,
    inert: bool,
    outstanding: HashMap<WriteId, LeaseReason>,
}

impl EditLeaseCoordinator {
    pub fn new(window_secs: u32, heartbeat_secs: u32) -> Self {
        Self {
            state: LeaseState::Released,
            window_secs,
            heartbeat_ms: u64::from(heartbeat_secs) * TICK_MS,
            remaining_secs: window_secs,
            next_tick_at: None,
            next_heartbeat_at: None,
            inert: false,
            outstanding: HashMap::new(),
        }
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// Edit mode is on from the moment the acquire is issued.
    pub fn edit_mode_enabled(&self) -> bool {
        matches!(self.state, LeaseState::Acquiring(_) | LeaseState::Held)
    }

    pub fn is_held(&self) -> bool {
        self.state == LeaseState::Held
    }

    pub fn is_inert(&self) -> bool {
        self.inert
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Countdown as `m:ss`.
    pub fn countdown_label(&self) -> String {
        format!("{}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }

    pub fn countdown_warning(&self) -> bool {
        self.is_held() && self.remaining_secs <= WARN_BELOW_SECS
    }

    pub fn next_deadline(&self) -> Option<u64> {
        match (self.next_tick_at, self.next_heartbeat_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Clear any flag left behind by a crashed session. Unconditional.
    pub fn mount(&mut self) -> Option<Effect> {
        if self.inert {
            return None;
        }
        self.stop_timers();
        self.state = LeaseState::Released;
        Some(self.flag(false, LeaseReason::MountReset, Delivery::Awaited))
    }

    pub fn enable(&mut self) -> Option<Effect> {
        if self.inert || self.edit_mode_enabled() {
            return None;
        }
        let effect = self.flag(true, LeaseReason::Acquire, Delivery::Awaited);
        self.state = LeaseState::Acquiring(effect.id());
        tracing::info!("acquiring edit lease");
        Some(effect)
    }

    /// Leave edit mode. A no-op unless edit mode is on.
    pub fn disable(&mut self, reason: LeaseReason) -> Option<Effect> {
        if self.inert || !self.edit_mode_enabled() {
            return None;
        }
        self.stop_timers();
        let effect = self.flag(false, reason, Delivery::Awaited);
        self.state = LeaseState::Releasing(effect.id());
        tracing::info!(reason = reason.as_str(), "releasing edit lease");
        Some(effect)
    }

    /// Session teardown: always clear the flag, then go inert.
    pub fn teardown(&mut self) -> Option<Effect> {
        self.shutdown(LeaseReason::Teardown)
    }

    /// Page unload: same as teardown. The write is issued and forgotten.
    pub fn unload(&mut self) -> Option<Effect> {
        self.shutdown(LeaseReason::Unload)
    }

    pub fn complete(&mut self, write: WriteId, result: Result<(), StorageError>, now_ms: u64) -> LeaseEvent {
        let reason = self.outstanding.remove(&write);
        match self.state {
            LeaseState::Acquiring(id) if id == write => match result {
                Ok(()) => {
                    self.state = LeaseState::Held;
                    self.remaining_secs = self.window_secs;
                    self.next_tick_at = Some(now_ms + TICK_MS);
                    self.next_heartbeat_at = Some(now_ms + self.heartbeat_ms);
                    tracing::info!(window_secs = self.window_secs, "edit lease held");
                    LeaseEvent::Acquired
                }
                Err(err) => {
                    self.state = LeaseState::Released;
                    tracing::warn!("edit lease acquisition failed: {err}");
                    LeaseEvent::AcquireFailed {
                        message: err.to_string(),
                    }
                }
            },
            LeaseState::Releasing(id) if id == write => {
                if let Err(err) = result {
                    tracing::warn!("edit lease release failed: {err}");
                }
                self.state = LeaseState::Released;
                LeaseEvent::Released
            }
            _ => {
                if let (Err(err), Some(reason)) = (result, reason) {
                    tracing::warn!(reason = reason.as_str(), "lease flag write failed: {err}");
                }
                LeaseEvent::Ignored
            }
        }
    }

    /// True if `write` is a lease flag write this coordinator issued and has
    /// not yet seen resolved.
    pub fn owns(&self, write: WriteId) -> bool {
        self.outstanding.contains_key(&write)
    }

    /// Process every countdown tick and heartbeat due at or before `now`.
    pub fn poll(&mut self, now_ms: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        while self.is_held() {
            let tick = self.next_tick_at.filter(|&t| t <= now_ms);
            let beat = self.next_heartbeat_at.filter(|&t| t <= now_ms);
            match (tick, beat) {
                (Some(t), b) if b.is_none_or(|b| t <= b) => {
                    self.remaining_secs = self.remaining_secs.saturating_sub(1);
                    self.next_tick_at = Some(t + TICK_MS);
                    if self.remaining_secs == 0 {
                        tracing::info!("edit window expired");
                        effects.extend(self.disable(LeaseReason::Expired));
                    }
                }
                (_, Some(b)) => {
                    self.next_heartbeat_at = Some(b + self.heartbeat_ms);
                    tracing::debug!("edit lease heartbeat");
                    effects.push(self.flag(true, LeaseReason::Heartbeat, Delivery::Awaited));
                }
                _ => break,
            }
        }
        effects
    }

    fn shutdown(&mut self, reason: LeaseReason) -> Option<Effect> {
        if self.inert {
            return None;
        }
        let effect = self.flag(false, reason, Delivery::BestEffort);
        self.stop_timers();
        self.state = LeaseState::Released;
        self.inert = true;
        self.outstanding.clear();
        tracing::info!(reason = reason.as_str(), "session closed, edit flag cleared");
        Some(effect)
    }

    fn stop_timers(&mut self) {
        self.next_tick_at = None;
        self.next_heartbeat_at = None;
        self.remaining_secs = self.window_secs;
    }

    fn flag(&mut self, active: bool, reason: LeaseReason, delivery: Delivery) -> Effect {
        let id = WriteId::new();
        if delivery == Delivery::Awaited {
            self.outstanding.insert(id, reason);
        }
        Effect::SetLeaseFlag {
            id,
            active,
            reason,
            delivery,
        }
    }
}
