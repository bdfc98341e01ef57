use crate::kinds::RecordKind;
use crate::models::{Record, StatusCounts};
use std::collections::BTreeMap;

/// Per-status badge counts over the full fetched set. Unrecognized or absent
/// statuses land in the kind's fallback bucket, so `total` always equals `records.len()`.
pub fn count_by_status(kind: RecordKind, records: &[Record]) -> StatusCounts {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(kind.canonical_status(record).to_string()).or_insert(0) += 1;
    }
    StatusCounts {
        counts,
        total: records.len(),
    }
}

/// Counts by an arbitrary categorical field; missing values use the kind default,
/// then `fallback`.
pub fn count_by_field(kind: RecordKind, records: &[Record], field: &str, fallback: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let key = kind
            .field_text(record, field)
            .unwrap_or_else(|| fallback.to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::UNKNOWN_STATUS;
    use serde_json::json;

    fn tasks(statuses: &[Option<&str>]) -> Vec<Record> {
        statuses
            .iter()
            .enumerate()
            .map(|(index, status)| {
                let mut value = json!({"id": format!("t{}", index)});
                if let Some(status) = status {
                    value["status"] = json!(status);
                }
                Record::from_value(value).expect("record")
            })
            .collect()
    }

    #[test]
    fn counts_each_status_over_the_full_set() {
        let records = tasks(&[
            Some("pending"),
            Some("pending"),
            Some("approved"),
            Some("rejected"),
            Some("pending"),
        ]);
        let counts = count_by_status(RecordKind::Task, &records);
        assert_eq!(counts.total, 5);
        assert_eq!(counts.counts.len(), 3);
        assert_eq!(counts.get("pending"), 3);
        assert_eq!(counts.get("approved"), 1);
        assert_eq!(counts.get("rejected"), 1);
        assert_eq!(counts.get("revoked"), 0);
    }

    #[test]
    fn unknown_statuses_are_bucketed_not_dropped() {
        let records = tasks(&[Some("PENDING"), Some("escalated"), None]);
        let counts = count_by_status(RecordKind::Task, &records);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.get("pending"), 1);
        assert_eq!(counts.get(UNKNOWN_STATUS), 2);
    }

    #[test]
    fn field_counts_apply_defaults() {
        let mut records = tasks(&[None, None]);
        records[0].fields.insert("priority".to_string(), json!("High"));
        let by_priority = count_by_field(RecordKind::Task, &records, "priority", UNKNOWN_STATUS);
        assert_eq!(by_priority.get("High"), Some(&1));
        assert_eq!(by_priority.get("Medium"), Some(&1));

        let by_type = count_by_field(RecordKind::Activity, &records, "type", "other");
        assert_eq!(by_type.get("other"), Some(&2));
    }
}
