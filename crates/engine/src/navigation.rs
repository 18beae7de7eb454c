//! Cell selection and in-place editing state machine.

/// A cell on the current page: row within the page, column index into the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Visible grid extent used to clamp arrow-key movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub rows: usize,
    pub cols: usize,
}

impl GridBounds {
    pub fn contains(&self, cell: CellPos) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    F2,
    Escape,
    Tab,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Browsing,
    Selected(CellPos),
    Editing {
        cell: CellPos,
        draft: String,
        original: String,
    },
    Committing(CellPos),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Ignored,
    Changed,
    /// The draft differs from the cell's value and must be persisted.
    Commit { cell: CellPos, draft: String },
}

#[derive(Debug, Clone)]
pub struct Navigator {
    state: NavState,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            state: NavState::Browsing,
        }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    /// The highlighted cell, whatever the mode.
    pub fn cell(&self) -> Option<CellPos> {
        match &self.state {
            NavState::Browsing => None,
            NavState::Selected(cell) | NavState::Committing(cell) => Some(*cell),
            NavState::Editing { cell, .. } => Some(*cell),
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, NavState::Editing { .. })
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.state {
            NavState::Editing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// `current` is the cell's display text, used to seed the draft.
    pub fn click(&mut self, cell: CellPos, edit_mode: bool, current: &str) {
        self.state = if edit_mode {
            editing(cell, current)
        } else {
            NavState::Selected(cell)
        };
    }

    pub fn double_click(&mut self, cell: CellPos, edit_mode: bool, current: &str) -> NavOutcome {
        if !edit_mode {
            return NavOutcome::Ignored;
        }
        self.state = editing(cell, current);
        NavOutcome::Changed
    }

    /// Handle a key press. `text_at` supplies the display text of a cell
    /// when Enter or F2 opens it for editing.
    pub fn key(
        &mut self,
        key: NavKey,
        edit_mode: bool,
        bounds: GridBounds,
        text_at: impl FnOnce(CellPos) -> String,
    ) -> NavOutcome {
        match (&self.state, key) {
            (NavState::Browsing, _) => NavOutcome::Ignored,
            (_, NavKey::Escape) => {
                self.state = NavState::Browsing;
                NavOutcome::Changed
            }
            (NavState::Selected(cell), NavKey::Up | NavKey::Down | NavKey::Left | NavKey::Right) => {
                let moved = step(*cell, key, bounds);
                if moved == *cell {
                    return NavOutcome::Ignored;
                }
                self.state = NavState::Selected(moved);
                NavOutcome::Changed
            }
            (NavState::Selected(cell), NavKey::Enter | NavKey::F2) if edit_mode => {
                let cell = *cell;
                self.state = editing(cell, &text_at(cell));
                NavOutcome::Changed
            }
            (NavState::Editing { .. }, NavKey::Enter | NavKey::Tab) => self.finish_edit(),
            _ => NavOutcome::Ignored,
        }
    }

    /// Replace the draft text. Only meaningful while editing.
    pub fn input(&mut self, text: &str) -> bool {
        match &mut self.state {
            NavState::Editing { draft, .. } => {
                *draft = text.to_string();
                true
            }
            _ => false,
        }
    }

    /// The editor lost focus: commit like Enter.
    pub fn blur(&mut self) -> NavOutcome {
        if self.is_editing() {
            self.finish_edit()
        } else {
            NavOutcome::Ignored
        }
    }

    /// The write for `cell` resolved, one way or the other.
    pub fn resolve_commit(&mut self, cell: CellPos) {
        if self.state == NavState::Committing(cell) {
            self.state = NavState::Selected(cell);
        }
    }

    /// Edit mode switched off: an open editor closes without saving.
    pub fn leave_edit_mode(&mut self) {
        if let NavState::Editing { cell, .. } = self.state {
            self.state = NavState::Selected(cell);
        }
    }

    /// Drop any selection or draft, e.g. after paging or a filter change.
    pub fn reset(&mut self) {
        self.state = NavState::Browsing;
    }

    fn finish_edit(&mut self) -> NavOutcome {
        let NavState::Editing {
            cell,
            draft,
            original,
        } = std::mem::replace(&mut self.state, NavState::Browsing)
        else {
            return NavOutcome::Ignored;
        };
        if draft == original {
            self.state = NavState::Selected(cell);
            return NavOutcome::Changed;
        }
        self.state = NavState::Committing(cell);
        NavOutcome::Commit { cell, draft }
    }
}

fn editing(cell: CellPos, current: &str) -> NavState {
    NavState::Editing {
        cell,
        draft: current.to_string(),
        original: current.to_string(),
    }
}

fn step(cell: CellPos, key: NavKey, bounds: GridBounds) -> CellPos {
    let CellPos { row, col } = cell;
    match key {
        NavKey::Up => CellPos::new(row.saturating_sub(1), col),
        NavKey::Down if row + 1 < bounds.rows => CellPos::new(row + 1, col),
        NavKey::Left => CellPos::new(row, col.saturating_sub(1)),
        NavKey::Right if col + 1 < bounds.cols => CellPos::new(row, col + 1),
        _ => cell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: GridBounds = GridBounds { rows: 3, cols: 4 };

    fn text(_: CellPos) -> String {
        "old".into()
    }

    #[test]
    fn click_selects_or_edits_depending_on_mode() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(1, 2), false, "old");
        assert_eq!(nav.state(), &NavState::Selected(CellPos::new(1, 2)));

        nav.click(CellPos::new(0, 0), true, "old");
        assert!(nav.is_editing());
        assert_eq!(nav.draft(), Some("old"));
    }

    #[test]
    fn double_click_ignored_outside_edit_mode() {
        let mut nav = Navigator::new();
        assert_eq!(nav.double_click(CellPos::new(0, 0), false, "x"), NavOutcome::Ignored);
        assert_eq!(nav.state(), &NavState::Browsing);
        assert_eq!(nav.double_click(CellPos::new(0, 0), true, "x"), NavOutcome::Changed);
        assert!(nav.is_editing());
    }

    #[test]
    fn arrows_clamp_at_edges() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(0, 0), false, "");
        assert_eq!(nav.key(NavKey::Up, false, BOUNDS, text), NavOutcome::Ignored);
        assert_eq!(nav.key(NavKey::Left, false, BOUNDS, text), NavOutcome::Ignored);
        nav.key(NavKey::Down, false, BOUNDS, text);
        nav.key(NavKey::Down, false, BOUNDS, text);
        assert_eq!(nav.key(NavKey::Down, false, BOUNDS, text), NavOutcome::Ignored);
        for _ in 0..5 {
            nav.key(NavKey::Right, false, BOUNDS, text);
        }
        assert_eq!(nav.cell(), Some(CellPos::new(2, 3)));
    }

    #[test]
    fn arrows_ignored_while_browsing() {
        let mut nav = Navigator::new();
        assert_eq!(nav.key(NavKey::Down, true, BOUNDS, text), NavOutcome::Ignored);
        assert_eq!(nav.state(), &NavState::Browsing);
    }

    #[test]
    fn enter_and_f2_open_editor_only_in_edit_mode() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(1, 1), false, "");
        assert_eq!(nav.key(NavKey::Enter, false, BOUNDS, text), NavOutcome::Ignored);
        assert_eq!(nav.key(NavKey::F2, true, BOUNDS, text), NavOutcome::Changed);
        assert_eq!(nav.draft(), Some("old"));
    }

    #[test]
    fn unchanged_draft_skips_commit() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(0, 1), true, "same");
        assert_eq!(nav.key(NavKey::Tab, true, BOUNDS, text), NavOutcome::Changed);
        assert_eq!(nav.state(), &NavState::Selected(CellPos::new(0, 1)));
    }

    #[test]
    fn changed_draft_commits_then_resolves() {
        let mut nav = Navigator::new();
        let cell = CellPos::new(2, 0);
        nav.click(cell, true, "old");
        assert!(nav.input("new"));
        assert_eq!(
            nav.key(NavKey::Enter, true, BOUNDS, text),
            NavOutcome::Commit {
                cell,
                draft: "new".into()
            }
        );
        assert_eq!(nav.state(), &NavState::Committing(cell));

        // Keys other than Escape are ignored until the write resolves.
        assert_eq!(nav.key(NavKey::Down, true, BOUNDS, text), NavOutcome::Ignored);
        nav.resolve_commit(cell);
        assert_eq!(nav.state(), &NavState::Selected(cell));
    }

    #[test]
    fn blur_commits_like_enter() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(0, 0), true, "a");
        nav.input("b");
        assert!(matches!(nav.blur(), NavOutcome::Commit { .. }));
        assert_eq!(nav.blur(), NavOutcome::Ignored);
    }

    #[test]
    fn escape_discards_from_any_active_state() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(0, 0), true, "a");
        nav.input("b");
        nav.key(NavKey::Escape, true, BOUNDS, text);
        assert_eq!(nav.state(), &NavState::Browsing);

        nav.click(CellPos::new(0, 0), true, "a");
        nav.input("b");
        nav.blur();
        nav.key(NavKey::Escape, true, BOUNDS, text);
        assert_eq!(nav.state(), &NavState::Browsing);
    }

    #[test]
    fn leaving_edit_mode_drops_draft() {
        let mut nav = Navigator::new();
        let cell = CellPos::new(1, 1);
        nav.click(cell, true, "a");
        nav.input("zzz");
        nav.leave_edit_mode();
        assert_eq!(nav.state(), &NavState::Selected(cell));
    }

    #[test]
    fn stale_resolution_does_not_move_selection() {
        let mut nav = Navigator::new();
        nav.click(CellPos::new(0, 0), true, "a");
        nav.input("b");
        nav.blur();
        nav.click(CellPos::new(2, 2), false, "");
        nav.resolve_commit(CellPos::new(0, 0));
        assert_eq!(nav.state(), &NavState::Selected(CellPos::new(2, 2)));
    }
}
