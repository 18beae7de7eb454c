use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Per-user, per-view grid layout: visible column order, pixel widths and sort.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub columns: Vec<String>,
    pub widths: BTreeMap<String, f32>,
    pub sort: Option<SortSpec>,
}

impl ColumnLayout {
    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == field)
    }

    pub fn width(&self, field: &str) -> Option<f32> {
        self.widths.get(field).copied()
    }

    /// Select `field` as the sort key: toggles direction when it already is
    /// the key, otherwise starts ascending on the new key.
    pub fn toggle_sort(&mut self, field: &str) {
        self.sort = match self.sort.take() {
            Some(spec) if spec.field == field => Some(SortSpec {
                field: spec.field,
                direction: spec.direction.flipped(),
            }),
            _ => Some(SortSpec::asc(field)),
        };
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_sort_flips_then_resets() {
        let mut layout = ColumnLayout::default();
        layout.toggle_sort("price");
        assert_eq!(layout.sort, Some(SortSpec::asc("price")));
        layout.toggle_sort("price");
        assert_eq!(layout.sort, Some(SortSpec::desc("price")));
        layout.toggle_sort("description");
        assert_eq!(layout.sort, Some(SortSpec::asc("description")));
    }

    #[test]
    fn layout_survives_msgpack() {
        let mut layout = ColumnLayout {
            columns: vec!["partnumber".into(), "price".into()],
            ..Default::default()
        };
        layout.widths.insert("price".into(), 95.5);
        layout.sort = Some(SortSpec::desc("price"));
        let bytes = layout.to_msgpack().unwrap();
        assert_eq!(ColumnLayout::from_msgpack(&bytes).unwrap(), layout);
    }
}
