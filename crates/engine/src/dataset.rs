use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use gridlease_core::{FieldValue, Record, RecordKey, SortDirection, SortSpec};

/// A case-insensitive substring test against one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub needle: String,
    pub negate: bool,
}

impl FieldFilter {
    pub fn contains(field: &str, needle: &str) -> Self {
        Self {
            field: field.to_string(),
            needle: needle.to_string(),
            negate: false,
        }
    }

    pub fn excludes(field: &str, needle: &str) -> Self {
        Self {
            field: field.to_string(),
            needle: needle.to_string(),
            negate: true,
        }
    }

    /// Whitespace-only needles do not constrain anything.
    pub fn is_blank(&self) -> bool {
        self.needle.trim().is_empty()
    }

    fn matches(&self, record: &Record) -> bool {
        let hay = record.get(&self.field).display_text().to_lowercase();
        let found = hay.contains(&self.needle.to_lowercase());
        found != self.negate
    }
}

/// Conjunction of field filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<FieldFilter>,
}

impl FilterSet {
    pub fn new(filters: Vec<FieldFilter>) -> Self {
        Self { filters }
    }

    pub fn with(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.iter().all(FieldFilter::is_blank)
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .filter(|f| !f.is_blank())
            .all(|f| f.matches(record))
    }
}

/// The session's copy of the record set plus its filtered and sorted views.
///
/// `filtered` and `sorted` hold indices into `all`, so a patched record is
/// visible through every view without copying.
#[derive(Debug, Default)]
pub struct GridDataset {
    all: Vec<Record>,
    filtered: Vec<usize>,
    sorted: Vec<usize>,
    by_key: HashMap<RecordKey, usize>,
    filters: FilterSet,
    sort: Option<SortSpec>,
    numeric_fields: BTreeSet<String>,
}

impl GridDataset {
    pub fn new(numeric_fields: BTreeSet<String>) -> Self {
        Self {
            numeric_fields,
            ..Default::default()
        }
    }

    pub fn set_all(&mut self, records: Vec<Record>) {
        self.by_key = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key.clone(), i))
            .collect();
        self.all = records;
        self.refilter();
    }

    pub fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
        self.refilter();
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.resort();
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn all(&self) -> &[Record] {
        &self.all
    }

    pub fn filtered(&self) -> impl Iterator<Item = &Record> {
        self.filtered.iter().map(|&i| &self.all[i])
    }

    pub fn sorted(&self) -> impl Iterator<Item = &Record> {
        self.sorted.iter().map(|&i| &self.all[i])
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Row count of the sorted view, which is what the grid shows.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Record at `row` of the sorted view.
    pub fn row(&self, row: usize) -> Option<&Record> {
        self.sorted.get(row).map(|&i| &self.all[i])
    }

    pub fn record(&self, key: &RecordKey) -> Option<&Record> {
        self.by_key.get(key).map(|&i| &self.all[i])
    }

    pub fn page_rows(&self, page: usize, rows_per_page: usize) -> impl Iterator<Item = &Record> {
        self.sorted
            .iter()
            .skip(page.saturating_mul(rows_per_page))
            .take(rows_per_page)
            .map(|&i| &self.all[i])
    }

    pub fn page_count(&self, rows_per_page: usize) -> usize {
        if rows_per_page == 0 {
            return 0;
        }
        self.sorted.len().div_ceil(rows_per_page)
    }

    /// Every field name seen in any record, in name order.
    pub fn columns(&self) -> BTreeSet<String> {
        self.all
            .iter()
            .flat_map(|r| r.fields.keys().cloned())
            .collect()
    }

    /// Overwrite one field in place (optionally stamping a timestamp field)
    /// and re-sort. Filters are not re-applied: an edited row stays in view
    /// until the filters next change. Returns the previous value, or `None`
    /// if the key is not loaded.
    pub fn patch(
        &mut self,
        key: &RecordKey,
        field: &str,
        value: FieldValue,
        stamp: Option<(&str, FieldValue)>,
    ) -> Option<FieldValue> {
        let &index = self.by_key.get(key)?;
        let record = &mut self.all[index];
        let previous = record.set(field, value);
        if let Some((stamp_field, stamp_value)) = stamp {
            record.set(stamp_field, stamp_value);
        }
        self.resort();
        Some(previous)
    }

    fn refilter(&mut self) {
        self.filtered = self
            .all
            .iter()
            .enumerate()
            .filter(|(_, r)| self.filters.matches(r))
            .map(|(i, _)| i)
            .collect();
        self.resort();
    }

    fn resort(&mut self) {
        let mut sorted = self.filtered.clone();
        if let Some(spec) = &self.sort {
            let numeric = self.numeric_fields.contains(&spec.field.to_lowercase());
            let all = &self.all;
            // `sort_by` is stable, so ties keep their filtered order in both directions.
            sorted.sort_by(|&a, &b| {
                let ord = compare_values(all[a].get(&spec.field), all[b].get(&spec.field), numeric);
                match spec.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        self.sorted = sorted;
    }
}

fn compare_values(a: &FieldValue, b: &FieldValue, numeric: bool) -> Ordering {
    if numeric {
        a.sort_number().total_cmp(&b.sort_number())
    } else {
        a.display_text()
            .to_lowercase()
            .cmp(&b.display_text().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric() -> BTreeSet<String> {
        ["price".to_string()].into_iter().collect()
    }

    fn product(key: &str, description: &str, price: f64) -> Record {
        Record::new("partnumber", RecordKey::new(key).unwrap())
            .with_field("description", description)
            .with_field("price", price)
    }

    fn keys<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<String> {
        records.map(|r| r.key.to_string()).collect()
    }

    fn sample() -> GridDataset {
        let mut ds = GridDataset::new(numeric());
        ds.set_all(vec![
            product("A", "abcd", 30.0),
            product("B", "xyz", 10.0),
            product("C", "ABCDE", 20.0),
        ]);
        ds
    }

    #[test]
    fn numeric_sort_ascending() {
        let mut ds = sample();
        ds.set_sort(Some(SortSpec::asc("price")));
        let prices: Vec<f64> = ds.sorted().map(|r| r.get("price").sort_number()).collect();
        assert_eq!(prices, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn numeric_sort_uses_parsed_text() {
        let mut ds = GridDataset::new(numeric());
        ds.set_all(vec![
            product("A", "", 0.0).with_field("price", "100"),
            product("B", "", 0.0).with_field("price", "9.5"),
            product("C", "", 0.0).with_field("price", "n/a"),
        ]);
        ds.set_sort(Some(SortSpec::asc("price")));
        assert_eq!(keys(ds.sorted()), vec!["C", "B", "A"]);
    }

    #[test]
    fn string_sort_is_case_insensitive() {
        let mut ds = sample();
        ds.set_sort(Some(SortSpec::asc("description")));
        assert_eq!(keys(ds.sorted()), vec!["A", "C", "B"]);
        ds.set_sort(Some(SortSpec::desc("description")));
        assert_eq!(keys(ds.sorted()), vec!["B", "C", "A"]);
    }

    #[test]
    fn sort_is_stable_both_directions() {
        let mut ds = GridDataset::new(numeric());
        ds.set_all(vec![
            product("A", "", 1.0),
            product("B", "", 2.0),
            product("C", "", 1.0),
            product("D", "", 2.0),
        ]);
        ds.set_sort(Some(SortSpec::asc("price")));
        assert_eq!(keys(ds.sorted()), vec!["A", "C", "B", "D"]);
        ds.set_sort(Some(SortSpec::desc("price")));
        assert_eq!(keys(ds.sorted()), vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn substring_filter_is_case_insensitive() {
        let mut ds = sample();
        ds.set_filters(FilterSet::default().with(FieldFilter::contains("description", "abc")));
        let descriptions: Vec<String> = ds
            .filtered()
            .map(|r| r.get("description").display_text())
            .collect();
        assert_eq!(descriptions, vec!["abcd", "ABCDE"]);
    }

    #[test]
    fn negated_filter_and_conjunction() {
        let mut ds = sample();
        ds.set_filters(
            FilterSet::default()
                .with(FieldFilter::contains("description", "abc"))
                .with(FieldFilter::excludes("description", "e")),
        );
        assert_eq!(keys(ds.filtered()), vec!["A"]);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let mut ds = sample();
        ds.set_filters(FilterSet::default().with(FieldFilter::excludes("description", "  ")));
        assert_eq!(ds.filtered_len(), 3);
        assert!(ds.filters().is_empty());
    }

    #[test]
    fn removing_a_filter_never_shrinks_the_view() {
        let filters = vec![
            FieldFilter::contains("description", "ab"),
            FieldFilter::excludes("description", "e"),
            FieldFilter::contains("partnumber", "a"),
        ];
        let mut ds = sample();
        ds.set_filters(FilterSet::new(filters.clone()));
        let full = ds.filtered_len();
        for skip in 0..filters.len() {
            let fewer: Vec<FieldFilter> = filters
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, f)| f.clone())
                .collect();
            ds.set_filters(FilterSet::new(fewer));
            assert!(ds.filtered_len() >= full);
            assert!(ds.filtered().all(|r| ds.all().contains(r)));
        }
    }

    #[test]
    fn sorted_is_permutation_of_filtered() {
        let mut ds = sample();
        ds.set_filters(FilterSet::default().with(FieldFilter::contains("description", "a")));
        ds.set_sort(Some(SortSpec::desc("price")));
        let mut filtered = keys(ds.filtered());
        let mut sorted = keys(ds.sorted());
        filtered.sort();
        sorted.sort();
        assert_eq!(filtered, sorted);
    }

    #[test]
    fn patch_resorts_but_does_not_refilter() {
        let mut ds = sample();
        ds.set_filters(FilterSet::default().with(FieldFilter::contains("description", "abc")));
        ds.set_sort(Some(SortSpec::asc("price")));
        assert_eq!(keys(ds.sorted()), vec!["C", "A"]);

        let key = RecordKey::new("A").unwrap();
        let previous = ds.patch(
            &key,
            "price",
            FieldValue::Number(5.0),
            Some(("last_edited", FieldValue::Timestamp(7))),
        );
        assert_eq!(previous, Some(FieldValue::Number(30.0)));
        assert_eq!(keys(ds.sorted()), vec!["A", "C"]);

        ds.patch(&key, "description", "no match".into(), None);
        assert_eq!(ds.len(), 2, "edited row stays until filters change");
        assert_eq!(ds.record(&key).unwrap().get("last_edited"), &FieldValue::Timestamp(7));

        ds.set_filters(ds.filters().clone());
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn patch_unknown_key_is_none() {
        let mut ds = sample();
        let key = RecordKey::new("Z").unwrap();
        assert!(ds.patch(&key, "price", FieldValue::Null, None).is_none());
    }

    #[test]
    fn paging_slices_sorted_view() {
        let mut ds = GridDataset::new(numeric());
        ds.set_all((0..45).map(|i| product(&format!("K{i:02}"), "", i as f64)).collect());
        ds.set_sort(Some(SortSpec::asc("price")));
        assert_eq!(ds.page_count(20), 3);
        assert_eq!(ds.page_rows(2, 20).count(), 5);
        assert_eq!(keys(ds.page_rows(1, 20).take(1)), vec!["K20"]);
        assert_eq!(ds.page_rows(9, 20).count(), 0);
    }

    #[test]
    fn columns_are_union_of_fields() {
        let mut ds = GridDataset::new(numeric());
        ds.set_all(vec![
            product("A", "x", 1.0),
            Record::new("partnumber", RecordKey::new("B").unwrap()).with_field("upc", "1"),
        ]);
        let cols: Vec<String> = ds.columns().into_iter().collect();
        assert_eq!(cols, vec!["description", "partnumber", "price", "upc"]);
    }
}
