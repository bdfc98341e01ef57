use crate::kinds::RecordKind;
use crate::models::{Record, SortDirection, SortSpec};
use chrono::{DateTime, Utc};

/// Stable temporal ordering. Records without a parseable value for the sort
/// field come last in both directions, in their original relative order.
pub fn sort_records(kind: RecordKind, records: &[Record], sort: &SortSpec) -> Vec<Record> {
    let field = sort.field.as_deref().unwrap_or_else(|| kind.date_field());

    let (mut dated, undated): (Vec<(Option<DateTime<Utc>>, &Record)>, Vec<_>) = records
        .iter()
        .map(|record| (record.timestamp(field), record))
        .partition(|(instant, _)| instant.is_some());

    // slice::sort_by is stable, so equal instants keep fetch order in both directions.
    dated.sort_by(|(left, _), (right, _)| match sort.direction {
        SortDirection::NewestFirst => right.cmp(left),
        SortDirection::OldestFirst => left.cmp(right),
    });

    dated
        .into_iter()
        .chain(undated)
        .map(|(_, record)| record.clone())
        .collect()
}
