//! Runs session effects against a storage backend.

use gridlease_core::WriteId;
use gridlease_storage::{GridBackend, StorageError};

use crate::effects::{Effect, LoadedView};
use crate::session::GridSession;

/// What executing one effect produced.
#[derive(Debug)]
pub enum Outcome {
    Write(WriteId, Result<(), StorageError>),
    Load(WriteId, Result<LoadedView, StorageError>),
    /// A best-effort write. Its result is logged and goes nowhere else.
    Forgotten,
}

pub fn execute<B: GridBackend + ?Sized>(backend: &mut B, effect: &Effect) -> Outcome {
    match effect {
        Effect::LoadView { id, user_id, view } => {
            let loaded = backend.fetch_all().and_then(|records| {
                let saved_layout = backend.get_layout(user_id, view)?;
                Ok(LoadedView {
                    records,
                    saved_layout,
                })
            });
            Outcome::Load(*id, loaded)
        }
        Effect::PersistField {
            id,
            key,
            field,
            value,
            stamp_field,
            edited_at,
        } => {
            let changes = [
                (field.clone(), value.clone()),
                (stamp_field.clone(), edited_at.clone()),
            ];
            Outcome::Write(*id, backend.update_fields(key, &changes))
        }
        Effect::PersistBulk {
            id,
            keys,
            field,
            value,
        } => Outcome::Write(*id, backend.update_many(keys, &[(field.clone(), value.clone())])),
        Effect::SetLeaseFlag { id, active, .. } => {
            let result = backend.set_active_edits(*active);
            if effect.is_best_effort() {
                if let Err(err) = result {
                    tracing::warn!("best-effort edit flag clear failed: {err}");
                }
                return Outcome::Forgotten;
            }
            Outcome::Write(*id, result)
        }
        Effect::SavePreferences {
            id,
            user_id,
            view,
            layout,
        } => Outcome::Write(*id, backend.put_layout(user_id, view, layout)),
    }
}

pub fn deliver(session: &mut GridSession, outcome: Outcome) {
    match outcome {
        Outcome::Write(id, result) => session.complete_write(id, result),
        Outcome::Load(id, result) => session.complete_load(id, result),
        Outcome::Forgotten => {}
    }
}

/// Execute queued effects in order, feeding each outcome straight back,
/// until the session stops producing new ones. Returns how many ran.
pub fn run_effects<B: GridBackend + ?Sized>(session: &mut GridSession, backend: &mut B) -> usize {
    let mut executed = 0;
    loop {
        let effects = session.take_effects();
        if effects.is_empty() {
            return executed;
        }
        for effect in &effects {
            tracing::trace!(kind = effect.kind(), id = ?effect.id(), "executing effect");
            let outcome = execute(backend, effect);
            deliver(session, outcome);
            executed += 1;
        }
    }
}
