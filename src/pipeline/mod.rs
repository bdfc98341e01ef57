//! Pure view derivation: filter, then sort, then paginate, over one immutable snapshot.

pub mod counters;
pub mod filter;
pub mod paginate;
pub mod sort;

pub use counters::{count_by_field, count_by_status};
pub use filter::filter_records;
pub use paginate::paginate;
pub use sort::sort_records;

use crate::kinds::RecordKind;
use crate::models::{PageResponse, Record, ViewState};

pub fn derive_view(kind: RecordKind, records: &[Record], state: &ViewState, max_page_size: u32) -> PageResponse<Record> {
    let filtered = filter_records(kind, records, &state.query, &state.facets, state.date_range.as_ref());
    let sorted = sort_records(kind, &filtered, &state.sort);
    paginate(sorted, state.page_size, state.page, max_page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortDirection;
    use serde_json::json;

    #[test]
    fn stages_run_in_order() {
        let records: Vec<Record> = (1..=12)
            .map(|day| {
                Record::from_value(json!({
                    "id": format!("t{}", day),
                    "title": if day % 2 == 0 { "even review" } else { "odd review" },
                    "status": "pending",
                    "createdAt": format!("2024-01-{:02}", day),
                }))
                .expect("record")
            })
            .collect();

        let mut state = ViewState {
            page_size: 4,
            ..ViewState::default()
        };
        state.set_query("even");
        state.sort.direction = SortDirection::OldestFirst;
        state.set_page(2);

        let page = derive_view(RecordKind::Task, &records, &state, 500);
        let ids: Vec<&str> = page.items.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(page.total_items, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(ids, vec!["t10", "t12"]);
        assert_eq!((page.range_start, page.range_end), (5, 6));
    }
}
