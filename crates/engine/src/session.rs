//! One open grid page: dataset, layout, navigation, edits and the edit lease.
//!
//! The session performs no I/O. Every operation queues [`Effect`]s which the
//! host drains with [`GridSession::take_effects`], executes, and reports back
//! through [`GridSession::complete_write`] / [`GridSession::complete_load`].
//! Outcomes may arrive in any order; ones the session no longer cares about
//! are dropped.

use std::collections::{HashMap, HashSet};

use gridlease_core::{Clock, ColumnLayout, Record, RecordKey, WriteId};
use gridlease_storage::StorageError;

use crate::bulk::{BulkResolution, BulkSelection, SelectAll};
use crate::config::SessionConfig;
use crate::dataset::{FilterSet, GridDataset};
use crate::edits::{EditController, EditResolution, SaveStatus};
use crate::effects::{Effect, LeaseReason, LoadedView};
use crate::error::EngineError;
use crate::layout::{self, DropPosition, FixedAdvance, SaveDebouncer, TextMeasure};
use crate::lease::{EditLeaseCoordinator, LeaseEvent, LeaseState};
use crate::navigation::{CellPos, GridBounds, NavKey, NavOutcome, NavState, Navigator};

pub struct GridSession {
    config: SessionConfig,
    clock: Box<dyn Clock>,
    measure: Box<dyn TextMeasure>,
    user_id: String,
    view: String,
    dataset: GridDataset,
    layout: ColumnLayout,
    nav: Navigator,
    edits: EditController,
    bulk: BulkSelection,
    lease: EditLeaseCoordinator,
    prefs: SaveDebouncer,
    page: usize,
    rows_per_page: usize,
    detail: Option<RecordKey>,
    banner: Option<String>,
    mounted: bool,
    pending_load: Option<WriteId>,
    committing: HashMap<WriteId, CellPos>,
    pref_writes: HashSet<WriteId>,
    effects: Vec<Effect>,
}

impl GridSession {
    pub fn new(config: SessionConfig, clock: Box<dyn Clock>, user_id: &str, view: &str) -> Self {
        Self {
            dataset: GridDataset::new(config.numeric_fields.clone()),
            bulk: BulkSelection::new(config.bulk_limit),
            lease: EditLeaseCoordinator::new(config.edit_window_secs, config.heartbeat_secs),
            prefs: SaveDebouncer::new(config.preference_debounce_ms),
            rows_per_page: config.rows_per_page,
            config,
            clock,
            measure: Box::new(FixedAdvance::default()),
            user_id: user_id.to_string(),
            view: view.to_string(),
            layout: ColumnLayout::default(),
            nav: Navigator::new(),
            edits: EditController::new(),
            page: 0,
            detail: None,
            banner: None,
            mounted: false,
            pending_load: None,
            committing: HashMap::new(),
            pref_writes: HashSet::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_measure(mut self, measure: Box<dyn TextMeasure>) -> Self {
        self.measure = measure;
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Clear any stale edit flag and load the records and saved layout.
    pub fn mount(&mut self) {
        if self.mounted || self.lease.is_inert() {
            return;
        }
        self.mounted = true;
        self.effects.extend(self.lease.mount());
        self.nav.reset();
        self.request_load();
        tracing::info!(user = %self.user_id, view = %self.view, "grid session mounted");
    }

    pub fn teardown(&mut self) {
        self.close(LeaseSignal::Teardown);
    }

    /// The page is going away. The flag write is best effort; after this the
    /// session ignores everything.
    pub fn page_unload(&mut self) {
        self.close(LeaseSignal::Unload);
    }

    pub fn is_active(&self) -> bool {
        self.mounted && !self.lease.is_inert()
    }

    /// Fetch the records again, e.g. after a bulk update.
    pub fn reload(&mut self) {
        if self.is_active() {
            self.request_load();
        }
    }

    // ========================================================================
    // Host I/O
    // ========================================================================

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    pub fn complete_load(&mut self, id: WriteId, result: Result<LoadedView, StorageError>) {
        if self.pending_load != Some(id) || self.lease.is_inert() {
            tracing::debug!(?id, "ignoring stale load");
            return;
        }
        self.pending_load = None;
        match result {
            Ok(view) => {
                let count = view.records.len();
                self.dataset.set_all(view.records);
                self.layout =
                    layout::initial_layout(&self.config, &self.dataset.columns(), view.saved_layout);
                self.dataset.set_sort(self.layout.sort.clone());
                self.clamp_page();
                self.nav.reset();
                tracing::info!(count, "records loaded");
            }
            Err(err) => {
                tracing::warn!("record load failed: {err}");
                self.banner = Some(format!("Failed to load records: {err}"));
            }
        }
    }

    pub fn complete_write(&mut self, id: WriteId, result: Result<(), StorageError>) {
        if self.lease.is_inert() {
            return;
        }
        let now = self.clock.now_ms();
        if self.lease.owns(id) {
            match self.lease.complete(id, result, now) {
                LeaseEvent::AcquireFailed { message } => {
                    self.nav.leave_edit_mode();
                    self.banner = Some(format!("Could not enable edit mode: {message}"));
                }
                LeaseEvent::Acquired | LeaseEvent::Released | LeaseEvent::Ignored => {}
            }
            return;
        }
        if self.edits.owns(id) {
            let committing = self.committing.remove(&id);
            let resolution =
                self.edits
                    .complete(id, result, &mut self.dataset, now, self.config.saved_badge_ms);
            if let Some(EditResolution::RolledBack {
                key,
                field,
                message,
            }) = resolution
            {
                self.banner = Some(format!("Failed to save {field} for {key}: {message}"));
            }
            if let Some(cell) = committing {
                self.nav.resolve_commit(cell);
            }
            return;
        }
        if self.pref_writes.remove(&id) {
            match result {
                Ok(()) => tracing::debug!(view = %self.view, "column preferences saved"),
                Err(err) => tracing::warn!(view = %self.view, "failed to save column preferences: {err}"),
            }
            return;
        }
        match self.bulk.complete(id, result) {
            Some(BulkResolution::Applied { count }) => {
                tracing::info!(count, "bulk update applied");
                self.request_load();
            }
            Some(BulkResolution::Failed { message }) => {
                self.banner = Some(format!("Failed to update products: {message}"));
            }
            None => tracing::debug!(?id, "ignoring stale write outcome"),
        }
    }

    /// Run every timer due at the clock's current time.
    pub fn poll(&mut self) {
        if self.lease.is_inert() {
            return;
        }
        let now = self.clock.now_ms();
        let lease_effects = self.lease.poll(now);
        self.effects.extend(lease_effects);
        if !self.lease.edit_mode_enabled() {
            self.nav.leave_edit_mode();
        }
        self.edits.poll(now);
        if self.prefs.poll(now) {
            self.save_preferences_now();
        }
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.lease.next_deadline(),
            self.edits.next_deadline(),
            self.prefs.due_at(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ========================================================================
    // Edit mode
    // ========================================================================

    /// Flip edit mode. Returns the new state.
    pub fn toggle_edit_mode(&mut self) -> Result<bool, EngineError> {
        self.ensure_active()?;
        if self.lease.edit_mode_enabled() {
            self.effects.extend(self.lease.disable(LeaseReason::Disabled));
            self.nav.leave_edit_mode();
            return Ok(false);
        }
        self.effects.extend(self.lease.enable());
        self.nav.reset();
        self.bulk.clear();
        self.detail = None;
        Ok(true)
    }

    pub fn edit_mode_enabled(&self) -> bool {
        self.lease.edit_mode_enabled()
    }

    pub fn lease_state(&self) -> LeaseState {
        self.lease.state()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.lease.remaining_secs()
    }

    pub fn countdown_label(&self) -> String {
        self.lease.countdown_label()
    }

    pub fn countdown_warning(&self) -> bool {
        self.lease.countdown_warning()
    }

    // ========================================================================
    // Filtering, sorting, paging
    // ========================================================================

    /// New filters leave edit mode and drop every selection.
    pub fn set_filters(&mut self, filters: FilterSet) {
        self.dataset.set_filters(filters);
        if !self.lease.is_inert() {
            self.effects.extend(self.lease.disable(LeaseReason::Filtered));
        }
        self.nav.reset();
        self.bulk.clear();
        self.detail = None;
        self.page = 0;
    }

    pub fn toggle_sort(&mut self, field: &str) {
        self.layout.toggle_sort(field);
        self.dataset.set_sort(self.layout.sort.clone());
        self.nav.reset();
        self.schedule_preferences();
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.clamp_page();
        self.nav.reset();
    }

    pub fn set_rows_per_page(&mut self, rows: usize) {
        self.rows_per_page = rows.max(1);
        self.page = 0;
        self.nav.reset();
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.dataset.page_count(self.rows_per_page)
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn visible_rows(&self) -> Vec<&Record> {
        self.dataset.page_rows(self.page, self.rows_per_page).collect()
    }

    pub fn dataset(&self) -> &GridDataset {
        &self.dataset
    }

    // ========================================================================
    // Navigation and cell editing
    // ========================================================================

    pub fn click(&mut self, cell: CellPos) -> Result<(), EngineError> {
        self.blur()?;
        let Some((key, _)) = self.cell_ref(cell) else {
            return Ok(());
        };
        let text = self.cell_text(cell);
        self.nav.click(cell, self.lease.edit_mode_enabled(), &text);
        self.detail = Some(key);
        Ok(())
    }

    pub fn double_click(&mut self, cell: CellPos) -> Result<(), EngineError> {
        if !self.lease.edit_mode_enabled() {
            return Ok(());
        }
        self.blur()?;
        let Some((key, _)) = self.cell_ref(cell) else {
            return Ok(());
        };
        let text = self.cell_text(cell);
        if self.nav.double_click(cell, true, &text) == NavOutcome::Changed {
            self.detail = Some(key);
        }
        Ok(())
    }

    pub fn key(&mut self, key: NavKey) -> Result<(), EngineError> {
        let bounds = self.bounds();
        let edit_mode = self.lease.edit_mode_enabled();
        let outcome = {
            let (dataset, layout, page, rpp) = (&self.dataset, &self.layout, self.page, self.rows_per_page);
            self.nav.key(key, edit_mode, bounds, |cell| {
                text_at(dataset, layout, page, rpp, cell)
            })
        };
        self.handle_outcome(outcome)
    }

    /// Replace the open editor's text.
    pub fn input(&mut self, text: &str) -> bool {
        self.nav.input(text)
    }

    pub fn blur(&mut self) -> Result<(), EngineError> {
        let outcome = self.nav.blur();
        self.handle_outcome(outcome)
    }

    pub fn nav_state(&self) -> &NavState {
        self.nav.state()
    }

    /// Persist `raw` into one field, as the detail panel does.
    pub fn commit_cell(&mut self, key: &RecordKey, field: &str, raw: &str) -> Result<WriteId, EngineError> {
        self.ensure_active()?;
        if !self.lease.edit_mode_enabled() {
            return Err(EngineError::EditModeDisabled);
        }
        let now = self.clock.now_ms();
        let effect = self
            .edits
            .commit(&self.config, &mut self.dataset, key, field, raw, now)?;
        let id = effect.id();
        // A cell awaiting its grid commit now resolves on this write.
        let superseded = self.committing.iter().find_map(|(write, cell)| {
            self.cell_ref(*cell)
                .is_some_and(|(k, f)| &k == key && f == field)
                .then_some(*write)
        });
        if let Some(cell) = superseded.and_then(|write| self.committing.remove(&write)) {
            self.committing.insert(id, cell);
        }
        self.effects.push(effect);
        Ok(id)
    }

    pub fn save_status(&self, key: &RecordKey, field: &str) -> Option<SaveStatus> {
        self.edits.status(key, field)
    }

    pub fn save_error(&self, key: &RecordKey, field: &str) -> Option<&str> {
        self.edits.entry(key, field).and_then(|e| e.error.as_deref())
    }

    /// Record and field under a cell of the current page.
    pub fn cell_ref(&self, cell: CellPos) -> Option<(RecordKey, String)> {
        let record = self.dataset.page_rows(self.page, self.rows_per_page).nth(cell.row)?;
        let field = self.layout.columns.get(cell.col)?;
        Some((record.key.clone(), field.clone()))
    }

    pub fn cell_text(&self, cell: CellPos) -> String {
        text_at(&self.dataset, &self.layout, self.page, self.rows_per_page, cell)
    }

    // ========================================================================
    // Detail panel
    // ========================================================================

    pub fn detail(&self) -> Option<&Record> {
        self.detail.as_ref().and_then(|k| self.dataset.record(k))
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
        self.nav.reset();
    }

    // ========================================================================
    // Bulk updates
    // ========================================================================

    pub fn toggle_bulk(&mut self, key: &RecordKey) -> Result<bool, EngineError> {
        self.bulk.toggle(key)
    }

    pub fn select_all_on_page(&mut self) -> SelectAll {
        let page_keys: Vec<RecordKey> = self
            .dataset
            .page_rows(self.page, self.rows_per_page)
            .map(|r| r.key.clone())
            .collect();
        let outcome = self.bulk.select_all_on_page(&page_keys);
        if let SelectAll::Selected { truncated: true, .. } = outcome {
            self.banner = Some(format!(
                "Only first {} products selected (maximum limit)",
                self.config.bulk_limit
            ));
        }
        outcome
    }

    /// Set `field` to `raw` on every selected record in one write. A blank
    /// value is treated as cancelled and returns `Ok(None)`.
    pub fn bulk_set_field(&mut self, field: &str, raw: &str) -> Result<Option<WriteId>, EngineError> {
        self.ensure_active()?;
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let effect = self.bulk.prepare(&self.config, field, value)?;
        let id = effect.id();
        self.effects.push(effect);
        Ok(Some(id))
    }

    pub fn bulk_selection(&self) -> &BulkSelection {
        &self.bulk
    }

    // ========================================================================
    // Column layout
    // ========================================================================

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn column_label<'a>(&'a self, field: &'a str) -> &'a str {
        self.config.label_for(field)
    }

    pub fn drag_column(&mut self, source: &str, target: &str) -> Result<(), EngineError> {
        self.require_column(source)?;
        self.require_column(target)?;
        if layout::drag_column(&mut self.layout, source, target) {
            self.nav.reset();
            self.schedule_preferences();
        }
        Ok(())
    }

    pub fn move_column(&mut self, source: &str, target: &str, position: DropPosition) -> Result<(), EngineError> {
        self.require_column(source)?;
        self.require_column(target)?;
        if layout::move_column(&mut self.layout, source, target, position) {
            self.nav.reset();
            self.schedule_preferences();
        }
        Ok(())
    }

    pub fn resize_column(&mut self, field: &str, width: f32) -> Result<(), EngineError> {
        self.require_column(field)?;
        layout::resize_column(&mut self.layout, field, width);
        self.schedule_preferences();
        Ok(())
    }

    pub fn auto_size_columns(&mut self) {
        let widths = {
            let sample = self.sample_rows();
            layout::auto_size(&self.config, &self.layout.columns, &sample, self.measure.as_ref())
        };
        self.layout.widths.extend(widths);
        self.schedule_preferences();
    }

    pub fn minimize_columns(&mut self) {
        let widths = {
            let sample = self.sample_rows();
            layout::minimize(&self.config, &self.layout.columns, &sample, self.measure.as_ref())
        };
        self.layout.widths.extend(widths);
        self.schedule_preferences();
    }

    /// Back to the default mapping, saved immediately.
    pub fn reset_layout(&mut self) {
        self.layout = layout::default_layout(&self.config, &self.dataset.columns());
        self.dataset.set_sort(None);
        self.nav.reset();
        self.prefs.cancel();
        self.save_preferences_now();
    }

    pub fn preferences_pending(&self) -> bool {
        self.prefs.is_pending()
    }

    // ========================================================================
    // Banner
    // ========================================================================

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn handle_outcome(&mut self, outcome: NavOutcome) -> Result<(), EngineError> {
        let NavOutcome::Commit { cell, draft } = outcome else {
            return Ok(());
        };
        let Some((key, field)) = self.cell_ref(cell) else {
            self.nav.resolve_commit(cell);
            return Ok(());
        };
        let now = self.clock.now_ms();
        match self
            .edits
            .commit(&self.config, &mut self.dataset, &key, &field, &draft, now)
        {
            Ok(effect) => {
                // Only the newest write for a cell may release its Committing state.
                self.committing.retain(|_, c| *c != cell);
                self.committing.insert(effect.id(), cell);
                self.effects.push(effect);
                Ok(())
            }
            Err(err) => {
                self.nav.resolve_commit(cell);
                Err(err)
            }
        }
    }

    fn close(&mut self, signal: LeaseSignal) {
        let effect = match signal {
            LeaseSignal::Teardown => self.lease.teardown(),
            LeaseSignal::Unload => self.lease.unload(),
        };
        let Some(effect) = effect else {
            return;
        };
        self.effects.push(effect);
        self.prefs.cancel();
        self.nav.reset();
        self.pending_load = None;
        self.committing.clear();
        self.pref_writes.clear();
    }

    fn request_load(&mut self) {
        let id = WriteId::new();
        self.pending_load = Some(id);
        self.effects.push(Effect::LoadView {
            id,
            user_id: self.user_id.clone(),
            view: self.view.clone(),
        });
    }

    fn schedule_preferences(&mut self) {
        let now = self.clock.now_ms();
        self.prefs.touch(now);
    }

    fn save_preferences_now(&mut self) {
        let id = WriteId::new();
        self.pref_writes.insert(id);
        self.effects.push(Effect::SavePreferences {
            id,
            user_id: self.user_id.clone(),
            view: self.view.clone(),
            layout: self.layout.clone(),
        });
    }

    fn ensure_active(&self) -> Result<(), EngineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::NotMounted)
        }
    }

    fn require_column(&self, field: &str) -> Result<(), EngineError> {
        match self.layout.position(field) {
            Some(_) => Ok(()),
            None => Err(EngineError::UnknownColumn(field.to_string())),
        }
    }

    fn bounds(&self) -> GridBounds {
        GridBounds {
            rows: self.dataset.page_rows(self.page, self.rows_per_page).count(),
            cols: self.layout.columns.len(),
        }
    }

    fn clamp_page(&mut self) {
        let last = self.page_count().saturating_sub(1);
        self.page = self.page.min(last);
    }

    fn sample_rows(&self) -> Vec<&Record> {
        self.dataset
            .sorted()
            .take(self.config.autosize_sample_rows)
            .collect()
    }
}

#[derive(Clone, Copy)]
enum LeaseSignal {
    Teardown,
    Unload,
}

fn text_at(
    dataset: &GridDataset,
    layout: &ColumnLayout,
    page: usize,
    rows_per_page: usize,
    cell: CellPos,
) -> String {
    let Some(record) = dataset.page_rows(page, rows_per_page).nth(cell.row) else {
        return String::new();
    };
    layout
        .columns
        .get(cell.col)
        .map(|field| record.get(field).display_text())
        .unwrap_or_default()
}
