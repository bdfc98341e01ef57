use crate::errors::{AppError, AppResult};
use crate::models::{SortDirection, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    pub page_size: Option<u32>,
    pub direction: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub notifications_collection: String,
    pub log_filter: String,
    pub views: BTreeMap<String, ViewSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            notifications_collection: "notifications".to_string(),
            log_filter: "info".to_string(),
            views: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Reads JSON when the extension is `.json`, YAML otherwise.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| AppError::Io(format!("{}: {}", path.display(), err)))?;
        let is_json = path
            .extension()
            .and_then(|value| value.to_str())
            .map(|value| value.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let settings = if is_json {
            serde_json::from_str::<Self>(&raw)
                .map_err(|err| AppError::InvalidInput(format!("{}: {}", path.display(), err)))?
        } else {
            Self::from_yaml_str(&raw)?
        };
        settings.validated()
    }

    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        let settings: Self = serde_yaml::from_str(raw)?;
        settings.validated()
    }

    /// Deep-merges a partial JSON update over the current settings.
    pub fn merge(&self, update: Value) -> AppResult<Self> {
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, update);
        let settings: Self =
            serde_json::from_value(merged).map_err(|err| AppError::InvalidInput(err.to_string()))?;
        settings.validated()
    }

    pub fn page_size_for(&self, view: &str) -> u32 {
        self.views
            .get(view)
            .and_then(|entry| entry.page_size)
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    pub fn direction_for(&self, view: &str) -> SortDirection {
        self.views
            .get(view)
            .and_then(|entry| entry.direction)
            .unwrap_or_default()
    }

    fn validated(self) -> AppResult<Self> {
        if self.max_page_size == 0 {
            return Err(AppError::InvalidInput("maxPageSize must be at least 1".to_string()));
        }
        if self.default_page_size == 0 {
            return Err(AppError::InvalidInput("defaultPageSize must be at least 1".to_string()));
        }
        if self.notifications_collection.trim().is_empty() {
            return Err(AppError::InvalidInput("notificationsCollection must not be empty".to_string()));
        }
        Ok(self)
    }
}

fn merge_json(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_overrides_apply_per_view() {
        let settings = Settings::from_yaml_str(
            "defaultPageSize: 12\nviews:\n  payment-history:\n    pageSize: 8\n    direction: oldest_first\n",
        )
        .expect("settings");
        assert_eq!(settings.page_size_for("payment-history"), 8);
        assert_eq!(settings.direction_for("payment-history"), SortDirection::OldestFirst);
        assert_eq!(settings.page_size_for("contacts"), 12);
        assert_eq!(settings.direction_for("contacts"), SortDirection::NewestFirst);
        assert_eq!(settings.notifications_collection, "notifications");
    }

    #[test]
    fn oversized_page_size_is_clamped() {
        let settings = Settings::default()
            .merge(json!({"maxPageSize": 50, "views": {"reports": {"pageSize": 900}}}))
            .expect("merge");
        assert_eq!(settings.page_size_for("reports"), 50);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let error = Settings::from_yaml_str("defaultPageSize: 0\n").expect_err("zero page size");
        assert!(error.to_string().starts_with("INVALID_INPUT"));
    }

    #[test]
    fn load_reads_json_and_yaml_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("settings.json");
        fs::write(&json_path, r#"{"logFilter": "debug"}"#).expect("write json");
        let yaml_path = dir.path().join("settings.yaml");
        fs::write(&yaml_path, "notificationsCollection: alerts\n").expect("write yaml");

        assert_eq!(Settings::load(&json_path).expect("json").log_filter, "debug");
        assert_eq!(
            Settings::load(&yaml_path).expect("yaml").notifications_collection,
            "alerts"
        );
        assert!(Settings::load(&dir.path().join("missing.yaml")).is_err());
    }
}
