use crate::kinds::{normalize_label, RecordKind};
use crate::models::{DateRange, Record};
use std::collections::BTreeMap;

pub const ALL_FACET_VALUE: &str = "all";
pub const TAB_FACET: &str = "tab";
pub const STATUS_FACET: &str = "status";

/// Records matching `query` on any of the kind's searchable fields and every active facet.
pub fn filter_records(
    kind: RecordKind,
    records: &[Record],
    query: &str,
    facets: &BTreeMap<String, String>,
    date_range: Option<&DateRange>,
) -> Vec<Record> {
    let needle = query.trim().to_lowercase();
    let active: Vec<(&str, &str)> = facets
        .iter()
        .map(|(name, value)| (name.as_str(), value.trim()))
        .filter(|(_, value)| is_active_facet(value))
        .collect();
    let date_range = date_range.filter(|range| !range.is_unbounded());

    records
        .iter()
        .filter(|record| matches_query(kind, record, &needle))
        .filter(|record| active.iter().all(|(name, value)| matches_facet(kind, record, name, value)))
        .filter(|record| date_range.map_or(true, |range| matches_date_range(kind, record, range)))
        .cloned()
        .collect()
}

fn is_active_facet(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case(ALL_FACET_VALUE)
}

fn matches_query(kind: RecordKind, record: &Record, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    kind.search_fields()
        .iter()
        .filter_map(|field| record.text(field))
        .any(|haystack| haystack.to_lowercase().contains(needle))
}

fn matches_facet(kind: RecordKind, record: &Record, name: &str, expected: &str) -> bool {
    match name {
        TAB_FACET => {
            let Some(statuses) = kind.tab_statuses(expected) else {
                return false;
            };
            statuses.contains(&kind.canonical_status(record))
        }
        STATUS_FACET => normalize_label(kind.canonical_status(record)) == normalize_label(expected),
        field => kind
            .field_text(record, field)
            .map(|actual| actual == expected)
            .unwrap_or(false),
    }
}

fn matches_date_range(kind: RecordKind, record: &Record, range: &DateRange) -> bool {
    record
        .timestamp(kind.date_field())
        .map(|instant| range.contains(instant))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn records(values: serde_json::Value) -> Vec<Record> {
        values
            .as_array()
            .expect("array")
            .iter()
            .cloned()
            .map(|value| Record::from_value(value).expect("record"))
            .collect()
    }

    fn facets(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    fn sample_tasks() -> Vec<Record> {
        records(json!([
            {"id": "1", "title": "Alpha Review", "status": "pending", "priority": "High", "projectId": "p1"},
            {"id": "2", "title": "Beta Launch", "status": "approved", "projectId": "p2"},
            {"id": "3", "title": "Gamma copy", "description": "alpha draft", "status": "Changes Requested", "projectId": "p1"},
            {"id": "4", "title": "Delta", "status": "on fire"}
        ]))
    }

    #[test]
    fn query_matches_any_search_field_case_insensitively() {
        let tasks = sample_tasks();
        let found = filter_records(RecordKind::Task, &tasks, "  ALPHA ", &BTreeMap::new(), None);
        assert_eq!(ids(&found), vec!["1", "3"]);
    }

    #[test]
    fn blank_query_and_all_facets_match_everything() {
        let tasks = sample_tasks();
        let found = filter_records(
            RecordKind::Task,
            &tasks,
            "   ",
            &facets(&[("status", "all"), ("projectId", "")]),
            None,
        );
        assert_eq!(found, tasks);
    }

    #[test]
    fn status_facet_normalizes_and_buckets_unknown() {
        let tasks = sample_tasks();
        let kind = RecordKind::Task;
        assert_eq!(
            ids(&filter_records(kind, &tasks, "", &facets(&[("status", "changes_requested")]), None)),
            vec!["3"]
        );
        assert_eq!(
            ids(&filter_records(kind, &tasks, "", &facets(&[("status", "unknown")]), None)),
            vec!["4"]
        );
    }

    #[test]
    fn field_facets_compare_exactly_and_use_kind_defaults() {
        let tasks = sample_tasks();
        let kind = RecordKind::Task;
        assert_eq!(
            ids(&filter_records(kind, &tasks, "", &facets(&[("projectId", "p1")]), None)),
            vec!["1", "3"]
        );
        assert!(filter_records(kind, &tasks, "", &facets(&[("projectId", "P1")]), None).is_empty());
        assert_eq!(
            ids(&filter_records(kind, &tasks, "", &facets(&[("priority", "Medium")]), None)),
            vec!["2", "3", "4"]
        );
    }

    #[test]
    fn tab_facet_uses_kind_tabs() {
        let tasks = sample_tasks();
        let kind = RecordKind::Task;
        assert_eq!(
            ids(&filter_records(kind, &tasks, "", &facets(&[("tab", "history")]), None)),
            vec!["2", "3"]
        );
        assert!(filter_records(kind, &tasks, "", &facets(&[("tab", "archive")]), None).is_empty());
    }

    #[test]
    fn facets_and_query_are_conjunctive() {
        let tasks = sample_tasks();
        let found = filter_records(
            RecordKind::Task,
            &tasks,
            "alpha",
            &facets(&[("status", "pending")]),
            None,
        );
        assert_eq!(ids(&found), vec!["1"]);
    }

    #[test]
    fn date_range_excludes_undated_records() {
        let payments = records(json!([
            {"id": "a", "date": "2024-01-10"},
            {"id": "b", "date": "2024-02-10"},
            {"id": "c"}
        ]));
        let range = DateRange {
            from: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).single(),
            to: None,
        };
        let found = filter_records(RecordKind::Transaction, &payments, "", &BTreeMap::new(), Some(&range));
        assert_eq!(ids(&found), vec!["b"]);
    }
}
