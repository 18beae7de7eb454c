//! Column layout operations and debounced preference persistence.

use std::collections::{BTreeMap, BTreeSet};

use gridlease_core::{ColumnLayout, Record};

use crate::config::SessionConfig;

/// Extra room for the sort arrow and drag handle in a header cell.
pub const HEADER_PADDING: f32 = 40.0;
/// Extra room around text in a body cell.
pub const CELL_PADDING: f32 = 20.0;
/// Smallest width a manual resize may produce.
pub const MIN_RESIZE_WIDTH: f32 = 40.0;

/// Measures rendered text width in pixels under the grid's font.
pub trait TextMeasure {
    fn width(&self, text: &str) -> f32;
}

/// Fixed advance per character. The default approximates 12px Poppins.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvance {
    pub px_per_char: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { px_per_char: 7.0 }
    }
}

impl TextMeasure for FixedAdvance {
    fn width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.px_per_char
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    After,
}

/// Default layout: the configured column mapping in ordinal order, limited
/// to columns present in the data, every column at the default width.
pub fn default_layout(config: &SessionConfig, present: &BTreeSet<String>) -> ColumnLayout {
    let columns: Vec<String> = config
        .default_columns
        .iter()
        .filter(|c| present.contains(&c.field))
        .map(|c| c.field.clone())
        .collect();
    let widths = columns
        .iter()
        .map(|c| (c.clone(), config.default_width))
        .collect();
    ColumnLayout {
        columns,
        widths,
        sort: None,
    }
}

/// Pick the layout a freshly loaded view starts with. A saved layout wins
/// when it names at least one column; columns no longer in the data are dropped.
pub fn initial_layout(
    config: &SessionConfig,
    present: &BTreeSet<String>,
    saved: Option<ColumnLayout>,
) -> ColumnLayout {
    match saved {
        Some(mut layout) if !layout.columns.is_empty() => {
            layout.columns.retain(|c| present.contains(c));
            layout
        }
        _ => default_layout(config, present),
    }
}

/// Move `source` next to `target`. Every other column keeps its relative order.
/// Returns false when either column is missing or they are the same column.
pub fn move_column(
    layout: &mut ColumnLayout,
    source: &str,
    target: &str,
    position: DropPosition,
) -> bool {
    if source == target {
        return false;
    }
    let (Some(from), Some(_)) = (layout.position(source), layout.position(target)) else {
        return false;
    };
    let moved = layout.columns.remove(from);
    // Target index shifts after the removal, so look it up again.
    let Some(target_at) = layout.position(target) else {
        return false;
    };
    let insert_at = match position {
        DropPosition::Before => target_at,
        DropPosition::After => target_at + 1,
    };
    layout.columns.insert(insert_at, moved);
    true
}

/// Drag-and-drop reorder with array-move semantics: the dragged column takes
/// the drop target's index, landing before it when dragged leftward and
/// after it when dragged rightward.
pub fn drag_column(layout: &mut ColumnLayout, source: &str, target: &str) -> bool {
    let (Some(from), Some(to)) = (layout.position(source), layout.position(target)) else {
        return false;
    };
    let position = if from > to {
        DropPosition::Before
    } else {
        DropPosition::After
    };
    move_column(layout, source, target, position)
}

pub fn resize_column(layout: &mut ColumnLayout, field: &str, width: f32) -> bool {
    if layout.position(field).is_none() {
        return false;
    }
    layout
        .widths
        .insert(field.to_string(), width.max(MIN_RESIZE_WIDTH));
    true
}

fn sample_widths<'s>(
    sample: &'s [&'s Record],
    field: &'s str,
    measure: &'s dyn TextMeasure,
) -> impl Iterator<Item = f32> + 's {
    sample
        .iter()
        .map(move |r| measure.width(&r.get(field).display_text()) + CELL_PADDING)
}

/// Widths that fit the header and the widest sampled cell, clamped to the
/// configured auto-width bounds.
pub fn auto_size(
    config: &SessionConfig,
    columns: &[String],
    sample: &[&Record],
    measure: &dyn TextMeasure,
) -> BTreeMap<String, f32> {
    columns
        .iter()
        .map(|col| {
            let header = measure.width(config.label_for(col)) + HEADER_PADDING;
            let widest = sample_widths(sample, col, measure).fold(header, f32::max);
            let width = widest.min(config.max_auto_width).max(config.min_auto_width);
            (col.clone(), width)
        })
        .collect()
}

/// Compact widths: the average sampled cell width, unless the header is wider
/// than that average, in which case 110% of the header.
pub fn minimize(
    config: &SessionConfig,
    columns: &[String],
    sample: &[&Record],
    measure: &dyn TextMeasure,
) -> BTreeMap<String, f32> {
    columns
        .iter()
        .map(|col| {
            let header = measure.width(config.label_for(col)) + HEADER_PADDING;
            let average = if sample.is_empty() {
                config.min_auto_width
            } else {
                sample_widths(sample, col, measure).sum::<f32>() / sample.len() as f32
            };
            let width = if header > average {
                (header * 1.1).max(config.min_auto_width)
            } else {
                average.max(config.min_auto_width)
            };
            (col.clone(), width)
        })
        .collect()
}

/// Coalesces bursts of layout changes into one save after a quiet period.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    quiet_ms: u64,
    due_at: Option<u64>,
}

impl SaveDebouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            due_at: None,
        }
    }

    /// Record a change at `now`, pushing the pending save back.
    pub fn touch(&mut self, now: u64) {
        self.due_at = Some(now + self.quiet_ms);
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn due_at(&self) -> Option<u64> {
        self.due_at
    }

    /// True exactly once when the quiet period has elapsed.
    pub fn poll(&mut self, now: u64) -> bool {
        match self.due_at {
            Some(due) if now >= due => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlease_core::RecordKey;

    fn layout(cols: &[&str]) -> ColumnLayout {
        ColumnLayout {
            columns: cols.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn order(layout: &ColumnLayout) -> Vec<&str> {
        layout.columns.iter().map(String::as_str).collect()
    }

    #[test]
    fn move_before_places_source_immediately_ahead() {
        let mut l = layout(&["a", "b", "c", "d", "e"]);
        assert!(move_column(&mut l, "a", "d", DropPosition::Before));
        assert_eq!(order(&l), vec!["b", "c", "a", "d", "e"]);
        assert!(move_column(&mut l, "e", "b", DropPosition::Before));
        assert_eq!(order(&l), vec!["e", "b", "c", "a", "d"]);
    }

    #[test]
    fn move_after() {
        let mut l = layout(&["a", "b", "c"]);
        assert!(move_column(&mut l, "c", "a", DropPosition::After));
        assert_eq!(order(&l), vec!["a", "c", "b"]);
    }

    #[test]
    fn drag_uses_array_move() {
        let mut l = layout(&["a", "b", "c", "d"]);
        assert!(drag_column(&mut l, "a", "c"));
        assert_eq!(order(&l), vec!["b", "c", "a", "d"]);
        assert!(drag_column(&mut l, "d", "b"));
        assert_eq!(order(&l), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn move_missing_or_same_is_noop() {
        let mut l = layout(&["a", "b"]);
        assert!(!move_column(&mut l, "a", "a", DropPosition::Before));
        assert!(!move_column(&mut l, "x", "a", DropPosition::Before));
        assert!(!drag_column(&mut l, "a", "x"));
        assert_eq!(order(&l), vec!["a", "b"]);
    }

    #[test]
    fn initial_layout_prefers_saved_and_drops_stale_columns() {
        let config = SessionConfig::default();
        let present: BTreeSet<String> = ["partnumber", "price", "description"]
            .into_iter()
            .map(String::from)
            .collect();

        let defaults = initial_layout(&config, &present, None);
        assert_eq!(order(&defaults), vec!["partnumber", "description", "price"]);
        assert_eq!(defaults.width("price"), Some(120.0));

        let saved = layout(&["price", "gone", "partnumber"]);
        let chosen = initial_layout(&config, &present, Some(saved));
        assert_eq!(order(&chosen), vec!["price", "partnumber"]);

        let empty_saved = initial_layout(&config, &present, Some(ColumnLayout::default()));
        assert_eq!(empty_saved, defaults);
    }

    fn record(value: &str) -> Record {
        Record::new("partnumber", RecordKey::new("K").unwrap()).with_field("f", value)
    }

    #[test]
    fn auto_size_bounds() {
        let config = SessionConfig::default();
        let measure = FixedAdvance { px_per_char: 10.0 };
        let cols = vec!["f".to_string()];

        // Header "f" = 10 + 40 = 50, below the floor.
        let tiny = [record("")];
        let refs: Vec<&Record> = tiny.iter().collect();
        assert_eq!(auto_size(&config, &cols, &refs, &measure)["f"], 80.0);

        let wide = [record("x"), record(&"y".repeat(12))];
        let refs: Vec<&Record> = wide.iter().collect();
        assert_eq!(auto_size(&config, &cols, &refs, &measure)["f"], 140.0);

        let huge = [record(&"z".repeat(100))];
        let refs: Vec<&Record> = huge.iter().collect();
        assert_eq!(auto_size(&config, &cols, &refs, &measure)["f"], 300.0);
    }

    #[test]
    fn minimize_uses_average_or_header() {
        let config = SessionConfig::default();
        let measure = FixedAdvance { px_per_char: 10.0 };
        let cols = vec!["f".to_string()];

        // Cells 10+20=30 and 190+20=210, average 120; header 50.
        let rows = [record("a"), record(&"b".repeat(19))];
        let refs: Vec<&Record> = rows.iter().collect();
        assert_eq!(minimize(&config, &cols, &refs, &measure)["f"], 120.0);

        // Long header "Short Description" (17 chars) = 210 beats the average.
        let cols = vec!["description".to_string()];
        let rows = [Record::new("partnumber", RecordKey::new("K").unwrap()).with_field("description", "ab")];
        let refs: Vec<&Record> = rows.iter().collect();
        let width = minimize(&config, &cols, &refs, &measure)["description"];
        assert!((width - 231.0).abs() < 1e-3);

        // No sample rows: the average falls back to the floor.
        let width = minimize(&config, &["f".to_string()], &[], &measure)["f"];
        assert_eq!(width, 80.0);
    }

    #[test]
    fn resize_clamps_and_requires_column() {
        let mut l = layout(&["a"]);
        assert!(resize_column(&mut l, "a", 10.0));
        assert_eq!(l.width("a"), Some(MIN_RESIZE_WIDTH));
        assert!(!resize_column(&mut l, "b", 100.0));
    }

    #[test]
    fn debouncer_coalesces_bursts() {
        let mut d = SaveDebouncer::new(1_000);
        d.touch(0);
        d.touch(400);
        d.touch(900);
        assert!(!d.poll(1_500));
        assert!(d.poll(1_900));
        assert!(!d.poll(5_000));
        d.touch(6_000);
        d.cancel();
        assert!(!d.poll(10_000));
    }
}
