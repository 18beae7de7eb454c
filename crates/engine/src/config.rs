use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One entry of the default column mapping: field name plus header label.
/// Position in the list is the column's default ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub field: String,
    pub label: String,
}

impl ColumnSpec {
    pub fn new(field: &str, label: &str) -> Self {
        Self {
            field: field.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub key_field: String,
    pub timestamp_field: String,
    pub numeric_fields: BTreeSet<String>,
    pub default_columns: Vec<ColumnSpec>,
    pub default_width: f32,
    pub edit_window_secs: u32,
    pub heartbeat_secs: u32,
    pub saved_badge_ms: u64,
    pub preference_debounce_ms: u64,
    pub bulk_limit: usize,
    pub rows_per_page: usize,
    pub autosize_sample_rows: usize,
    pub min_auto_width: f32,
    pub max_auto_width: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_field: "partnumber".into(),
            timestamp_field: "last_edited".into(),
            numeric_fields: [
                "price",
                "listprice",
                "map",
                "master_carton_price",
                "master_carton_qty",
                "inv_max",
                "inv_min",
                "inventory",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_columns: vec![
                ColumnSpec::new("partnumber", "Part Number"),
                ColumnSpec::new("description", "Short Description"),
                ColumnSpec::new("price", "Price"),
                ColumnSpec::new("master_carton_price", "M/C Price"),
                ColumnSpec::new("master_carton_qty", "M/C QTY"),
                ColumnSpec::new("listprice", "MSRP"),
                ColumnSpec::new("map", "MAP"),
                ColumnSpec::new("upc", "UPC"),
                ColumnSpec::new("category", "Category"),
                ColumnSpec::new("brand", "Brand"),
                ColumnSpec::new("image", "Image File"),
                ColumnSpec::new("weblongdescr", "WEBLONGDESCR"),
                ColumnSpec::new("inv_max", "MAX INV"),
                ColumnSpec::new("inv_min", "MIN INV"),
                ColumnSpec::new("date_created", "Created"),
                ColumnSpec::new("date_edited", "Edited"),
                ColumnSpec::new("vendor", "Vendor"),
                ColumnSpec::new("vendor_part_number", "Vendor Part"),
            ],
            default_width: 120.0,
            edit_window_secs: 300,
            heartbeat_secs: 30,
            saved_badge_ms: 2_000,
            preference_debounce_ms: 1_000,
            bulk_limit: 10,
            rows_per_page: 20,
            autosize_sample_rows: 50,
            min_auto_width: 80.0,
            max_auto_width: 300.0,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: SessionConfig =
            toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Load from `path` if it exists, falling back to defaults, then apply
    /// `GRIDLEASE_*` environment overrides.
    pub fn load_or_default(path: &Path) -> Self {
        let mut config = if path.exists() {
            match Self::load_from_path(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("config load failed, using defaults: {e}");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Invalid values are ignored with a warning.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let before = self.clone();
        override_number(&lookup, "GRIDLEASE_EDIT_WINDOW_SECS", &mut self.edit_window_secs);
        override_number(&lookup, "GRIDLEASE_HEARTBEAT_SECS", &mut self.heartbeat_secs);
        override_number(&lookup, "GRIDLEASE_ROWS_PER_PAGE", &mut self.rows_per_page);
        if let Err(e) = self.validate() {
            tracing::warn!("environment overrides rejected: {e}");
            *self = before;
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.key_field.trim().is_empty() {
            return Err(EngineError::Config("key_field must not be empty".into()));
        }
        if self.edit_window_secs == 0 {
            return Err(EngineError::Config("edit_window_secs must be positive".into()));
        }
        if self.heartbeat_secs == 0 || self.heartbeat_secs >= self.edit_window_secs {
            return Err(EngineError::Config(format!(
                "heartbeat_secs ({}) must be positive and shorter than edit_window_secs ({})",
                self.heartbeat_secs, self.edit_window_secs
            )));
        }
        if self.bulk_limit == 0 {
            return Err(EngineError::Config("bulk_limit must be at least 1".into()));
        }
        if self.rows_per_page == 0 {
            return Err(EngineError::Config("rows_per_page must be at least 1".into()));
        }
        if self.min_auto_width > self.max_auto_width {
            return Err(EngineError::Config("min_auto_width exceeds max_auto_width".into()));
        }
        Ok(())
    }

    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric_fields.contains(&field.to_lowercase())
    }

    pub fn label_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.default_columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.label.as_str())
            .unwrap_or(field)
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        match trimmed.parse::<T>() {
            Ok(value) => *target = value,
            Err(err) => tracing::warn!("invalid {name}, ignoring: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.edit_window_secs, 300);
        assert_eq!(config.heartbeat_secs, 30);
        assert!(config.is_numeric("price"));
        assert!(config.is_numeric("PRICE"));
        assert!(!config.is_numeric("description"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            edit_window_secs = 120
            numeric_fields = ["unitcost", "qty"]
            "#,
        )
        .unwrap();
        assert_eq!(config.edit_window_secs, 120);
        assert_eq!(config.heartbeat_secs, 30);
        assert!(config.is_numeric("unitcost"));
        assert!(!config.is_numeric("price"));
        assert_eq!(config.key_field, "partnumber");
    }

    #[test]
    fn heartbeat_must_be_shorter_than_window() {
        let err = SessionConfig::from_toml_str("edit_window_secs = 30\nheartbeat_secs = 30").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let mut config = SessionConfig::default();
        config.apply_env_overrides(|name| match name {
            "GRIDLEASE_EDIT_WINDOW_SECS" => Some("600".into()),
            "GRIDLEASE_HEARTBEAT_SECS" => Some("soon".into()),
            _ => None,
        });
        assert_eq!(config.edit_window_secs, 600);
        assert_eq!(config.heartbeat_secs, 30);
    }

    #[test]
    fn env_overrides_that_break_validation_are_dropped() {
        let mut config = SessionConfig::default();
        config.apply_env_overrides(|name| match name {
            "GRIDLEASE_HEARTBEAT_SECS" => Some("900".into()),
            _ => None,
        });
        assert_eq!(config.heartbeat_secs, 30);
    }

    #[test]
    fn load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gridlease.toml");
        fs::write(&path, "rows_per_page = 50\nbulk_limit = 5\n")?;
        let config = SessionConfig::load_from_path(&path)?;
        assert_eq!(config.rows_per_page, 50);
        assert_eq!(config.bulk_limit, 5);

        let missing = SessionConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(missing.rows_per_page, SessionConfig::default().rows_per_page);
        Ok(())
    }

    #[test]
    fn label_falls_back_to_field_name() {
        let config = SessionConfig::default();
        assert_eq!(config.label_for("listprice"), "MSRP");
        assert_eq!(config.label_for("mystery"), "mystery");
    }
}
