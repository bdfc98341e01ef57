//! Collaborator interfaces the view pipeline depends on, plus the two
//! document stores shipped with the crate.

pub mod memory;
pub mod sqlite;

use crate::errors::AppResult;
use crate::models::{parse_timestamp, AssetUpload, CurrentUser, Predicate, Record, UploadedAsset, ID_FIELD};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Every record in `collection` matching all `predicates`, in store order.
    async fn query(&self, collection: &str, predicates: &[Predicate]) -> AppResult<Vec<Record>>;

    /// Partial merge: fields not present in `fields` are left untouched.
    async fn update(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> AppResult<()>;

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> AppResult<String>;
}

#[async_trait]
pub trait Identity: Send + Sync {
    async fn current_user(&self) -> Option<CurrentUser>;
}

#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, asset: AssetUpload) -> AppResult<UploadedAsset>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<CurrentUser>,
}

impl StaticIdentity {
    pub fn signed_in(user: CurrentUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Identity for StaticIdentity {
    async fn current_user(&self) -> Option<CurrentUser> {
        self.user.clone()
    }
}

pub fn matches_predicates(record: &Record, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| matches_predicate(record, predicate))
}

fn field_value(record: &Record, field: &str) -> Option<Value> {
    if field == ID_FIELD {
        return Some(Value::String(record.id.clone()));
    }
    record.get(field).cloned()
}

fn matches_predicate(record: &Record, predicate: &Predicate) -> bool {
    let Some(actual) = field_value(record, predicate.field()) else {
        return false;
    };
    match predicate {
        Predicate::Eq { value, .. } => values_equal(&actual, value),
        Predicate::In { values, .. } => values.iter().any(|value| values_equal(&actual, value)),
        Predicate::Range { min, max, .. } => {
            let above_min = min
                .as_ref()
                .map_or(true, |min| matches!(compare_values(&actual, min), Some(Ordering::Greater | Ordering::Equal)));
            let below_max = max
                .as_ref()
                .map_or(true, |max| matches!(compare_values(&actual, max), Some(Ordering::Less | Ordering::Equal)));
            above_min && below_max
        }
        Predicate::ArrayContains { value, .. } => match &actual {
            Value::Array(items) => items.iter().any(|item| values_equal(item, value)),
            _ => false,
        },
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

/// Ordering for range predicates: numbers numerically, timestamps chronologically,
/// remaining strings lexicographically. Mixed shapes are incomparable.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left_raw), Value::String(right_raw)) => {
            match (parse_timestamp(left), parse_timestamp(right)) {
                (Some(left), Some(right)) => Some(left.cmp(&right)),
                _ => Some(left_raw.cmp(right_raw)),
            }
        }
        _ => {
            let left = parse_timestamp(left)?;
            let right = parse_timestamp(right)?;
            Some(left.cmp(&right))
        }
    }
}
