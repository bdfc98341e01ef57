use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const ID_FIELD: &str = "id";
pub const STATUS_FIELD: &str = "status";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// One document as returned by the data store. Everything except `id` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove(ID_FIELD);
        Self { id: id.into(), fields }
    }

    pub fn from_value(value: Value) -> AppResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(AppError::InvalidInput("record must be a JSON object".to_string()));
        };
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(AppError::InvalidInput("record is missing a string id".to_string())),
        };
        Ok(Self { id, fields })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    /// Scalar value of `field` rendered as text. `id` resolves to the record id.
    pub fn text(&self, field: &str) -> Option<String> {
        if field == ID_FIELD {
            return Some(self.id.clone());
        }
        match self.get(field)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(parse_timestamp)
    }

    /// Shallow merge: top-level keys in `patch` replace the record's, everything else is untouched.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            if key == ID_FIELD {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

impl TryFrom<Value> for Record {
    type Error = AppError;

    fn try_from(value: Value) -> AppResult<Self> {
        Self::from_value(value)
    }
}

/// Accepts RFC 3339 strings, `YYYY-MM-DD`, epoch milliseconds and
/// `{seconds, nanoseconds}` timestamp objects (with or without the leading underscore).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Some(parsed.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(millis) => millis
            .as_i64()
            .or_else(|| millis.as_f64().map(|value| value as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

/// Store-side constraint. A query's predicates are ANDed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Range {
        field: String,
        min: Option<Value>,
        max: Option<Value>,
    },
    ArrayContains { field: String, value: Value },
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn one_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(field: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        Self::Range {
            field: field.into(),
            min,
            max,
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. }
            | Self::In { field, .. }
            | Self::Range { field, .. }
            | Self::ArrayContains { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    /// Temporal field to order by. Defaults to the record kind's date field.
    pub field: Option<String>,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from) && self.to.map_or(true, |to| instant <= to)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Everything a view needs to re-derive its visible page from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub query: String,
    pub facets: BTreeMap<String, String>,
    pub date_range: Option<DateRange>,
    pub sort: SortSpec,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            query: String::new(),
            facets: BTreeMap::new(),
            date_range: None,
            sort: SortSpec::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ViewState {
    pub fn set_query(&mut self, query: impl Into<String>) -> bool {
        let query = query.into();
        if query == self.query {
            return false;
        }
        self.query = query;
        self.page = 1;
        true
    }

    pub fn set_facet(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        if self.facets.get(&name) == Some(&value) {
            return false;
        }
        self.facets.insert(name, value);
        self.page = 1;
        true
    }

    pub fn clear_facet(&mut self, name: &str) -> bool {
        if self.facets.remove(name).is_none() {
            return false;
        }
        self.page = 1;
        true
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) -> bool {
        let range = range.filter(|value| !value.is_unbounded());
        if range == self.date_range {
            return false;
        }
        self.date_range = range;
        self.page = 1;
        true
    }

    pub fn set_sort(&mut self, sort: SortSpec) -> bool {
        if sort == self.sort {
            return false;
        }
        self.sort = sort;
        self.page = 1;
        true
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total_items: usize,
    /// 1-indexed, inclusive. Zero when there is nothing to show.
    pub range_start: usize,
    pub range_end: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> PageResponse<T> {
    pub fn show_controls(&self) -> bool {
        self.total_items > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

impl StatusCounts {
    pub fn get(&self, status: &str) -> usize {
        self.counts.get(status).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed { message: String },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub url: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub collection: String,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl FetchRequest {
    pub fn new(collection: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            collection: collection.into(),
            predicates,
        }
    }
}

/// Resolves `source_field` (an id in `collection`) into `as_field` copied from the referenced record's `target_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceJoin {
    pub source_field: String,
    pub collection: String,
    pub target_field: String,
    pub as_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    pub kind: String,
    pub message: String,
    pub recipient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub record_id: String,
    pub new_status: String,
    #[serde(default)]
    pub extra_fields: Map<String, Value>,
    pub notification: Option<NotificationSpec>,
}

impl ActionRequest {
    pub fn new(record_id: impl Into<String>, new_status: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            new_status: new_status.into(),
            extra_fields: Map::new(),
            notification: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_notification(mut self, notification: NotificationSpec) -> Self {
        self.notification = Some(notification);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub record: Record,
    pub notification_id: Option<String>,
    pub notification_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_accepts_what_from_value_accepts() {
        let numeric: Record = serde_json::from_str(r#"{"id": 42, "status": "pending"}"#).expect("numeric id");
        assert_eq!(numeric.id, "42");
        assert_eq!(numeric, Record::from_value(json!({"id": 42, "status": "pending"})).expect("record"));

        assert!(serde_json::from_str::<Record>(r#"{"id": "", "status": "pending"}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"{"status": "pending"}"#).is_err());

        let round_trip: Record =
            serde_json::from_value(serde_json::to_value(&numeric).expect("serialize")).expect("deserialize");
        assert_eq!(round_trip, numeric);
    }

    #[test]
    fn record_from_value_splits_id_from_fields() {
        let record = Record::from_value(json!({"id": "p1", "name": "Site launch", "budget": 1200}))
            .expect("record");
        assert_eq!(record.id, "p1");
        assert!(!record.fields.contains_key("id"));
        assert_eq!(record.text("budget").as_deref(), Some("1200"));
        assert_eq!(record.text("id").as_deref(), Some("p1"));
    }

    #[test]
    fn record_without_id_is_rejected() {
        let error = Record::from_value(json!({"name": "nameless"})).expect_err("must fail");
        assert!(error.to_string().starts_with("INVALID_INPUT"));
    }

    #[test]
    fn merge_is_shallow_and_keeps_id() {
        let mut record = Record::from_value(json!({
            "id": "t1",
            "status": "pending",
            "meta": {"a": 1, "b": 2}
        }))
        .expect("record");
        let patch = json!({"id": "other", "status": "approved", "meta": {"a": 5}});
        record.merge(patch.as_object().expect("object"));
        assert_eq!(record.id, "t1");
        assert_eq!(record.fields["status"], json!("approved"));
        assert_eq!(record.fields["meta"], json!({"a": 5}));
    }

    #[test]
    fn timestamps_parse_from_supported_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single().expect("date");
        assert_eq!(parse_timestamp(&json!("2024-03-01T00:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-03-01")), Some(expected));
        assert_eq!(parse_timestamp(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(
            parse_timestamp(&json!({"seconds": expected.timestamp(), "nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp(&json!({"_seconds": expected.timestamp(), "_nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!("next tuesday")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn view_state_changes_reset_page() {
        let mut state = ViewState::default();
        state.set_page(3);
        assert!(!state.set_query(""));
        assert_eq!(state.page, 3);

        assert!(state.set_query("alpha"));
        assert_eq!(state.page, 1);

        state.set_page(2);
        assert!(state.set_facet("status", "pending"));
        assert_eq!(state.page, 1);

        state.set_page(2);
        assert!(!state.set_facet("status", "pending"));
        assert_eq!(state.page, 2);
        assert!(state.clear_facet("status"));
        assert_eq!(state.page, 1);
    }

    #[test]
    fn view_state_serializes_camel_case() {
        let value = serde_json::to_value(ViewState::default()).expect("serialize");
        assert_eq!(value["pageSize"], json!(DEFAULT_PAGE_SIZE));
        assert_eq!(value["sort"]["direction"], json!("newest_first"));
    }
}
