use crate::config::Settings;
use crate::errors::{AppError, AppResult};
use crate::fetcher::{dedupe_by_id, CollectionFetcher};
use crate::kinds::RecordKind;
use crate::models::{
    DateRange, LoadState, PageResponse, Predicate, Record, SortSpec, StatusCounts, ViewState,
};
use crate::pipeline::{count_by_field, count_by_status, derive_view};
use crate::store::Identity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Which slice of a collection a view loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewScope {
    pub collection: String,
    /// When set, only records whose field equals the current user's id are loaded.
    pub owner_field: Option<String>,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl ViewScope {
    pub fn for_kind(kind: RecordKind) -> Self {
        Self {
            collection: kind.collection().to_string(),
            owner_field: None,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutput {
    pub load: LoadState,
    pub page: PageResponse<Record>,
    pub counts: StatusCounts,
}

/// Controller for one view's state and snapshot.
///
/// Each session owns its records exclusively; two views never share a snapshot,
/// so a local patch in one is only seen by another after it re-fetches.
#[derive(Debug, Clone)]
pub struct ViewSession {
    name: String,
    kind: RecordKind,
    scope: ViewScope,
    state: ViewState,
    records: Vec<Record>,
    counts: StatusCounts,
    load: LoadState,
    generation: u64,
    max_page_size: u32,
}

impl ViewSession {
    pub fn new(name: impl Into<String>, kind: RecordKind, settings: &Settings) -> Self {
        let name = name.into();
        let mut state = ViewState {
            page_size: settings.page_size_for(&name),
            ..ViewState::default()
        };
        state.sort.direction = settings.direction_for(&name);

        Self {
            scope: ViewScope::for_kind(kind),
            kind,
            name,
            state,
            records: Vec::new(),
            counts: StatusCounts::default(),
            load: LoadState::Idle,
            generation: 0,
            max_page_size: settings.max_page_size,
        }
    }

    pub fn with_scope(mut self, scope: ViewScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn owned_by(mut self, owner_field: impl Into<String>) -> Self {
        self.scope.owner_field = Some(owner_field.into());
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.scope.predicates.push(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn counts(&self) -> &StatusCounts {
        &self.counts
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    /// Replaces the whole view state, e.g. when restoring a persisted one.
    pub fn restore_state(&mut self, mut state: ViewState) {
        state.page_size = state.page_size.clamp(1, self.max_page_size.max(1));
        state.page = state.page.max(1);
        self.state = state;
    }

    pub fn set_query(&mut self, query: impl Into<String>) -> bool {
        self.state.set_query(query)
    }

    pub fn set_facet(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.state.set_facet(name, value)
    }

    pub fn clear_facet(&mut self, name: &str) -> bool {
        self.state.clear_facet(name)
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) -> bool {
        self.state.set_date_range(range)
    }

    pub fn set_sort(&mut self, sort: SortSpec) -> bool {
        self.state.set_sort(sort)
    }

    pub fn set_page(&mut self, page: u32) {
        self.state.set_page(page);
    }

    /// Starts a fetch. Any ticket handed out earlier becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.load = LoadState::Loading;
        FetchTicket(self.generation)
    }

    /// Drops any in-flight fetch; its result will be ignored when it arrives.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if self.load.is_loading() {
            self.load = LoadState::Idle;
        }
    }

    /// Applies a fetch result if `ticket` is still current. Returns whether it was applied.
    /// A failure keeps the previous snapshot and marks the view failed.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: AppResult<Vec<Record>>) -> bool {
        match result {
            Ok(records) => self.apply_records(ticket, records),
            Err(error) => self.apply_failure(ticket, &error),
        }
    }

    /// Fetches this view's scope and installs the result. With an owner-scoped view and
    /// no current user the store is not queried and the view becomes ready and empty.
    pub async fn refresh(&mut self, fetcher: &CollectionFetcher, identity: &dyn Identity) -> AppResult<()> {
        let ticket = self.begin_fetch();
        let result = match self.scope.owner_field.as_deref() {
            Some(owner_field) => fetcher
                .fetch_scoped(identity, &self.scope.collection, owner_field, &self.scope.predicates)
                .await
                .map(Option::unwrap_or_default),
            None => fetcher.fetch(&self.scope.collection, &self.scope.predicates).await,
        };

        match result {
            Ok(records) => {
                self.apply_records(ticket, records);
                Ok(())
            }
            Err(error) => {
                self.apply_failure(ticket, &error);
                Err(error)
            }
        }
    }

    /// Derives the visible page and adopts the clamped page number into the view state.
    pub fn render(&mut self) -> ViewOutput {
        let page = derive_view(self.kind, &self.records, &self.state, self.max_page_size);
        self.state.page = page.page;
        ViewOutput {
            load: self.load.clone(),
            page,
            counts: self.counts.clone(),
        }
    }

    /// Category counts over the full snapshot, independent of the active filters.
    pub fn category_counts(&self, field: &str, fallback: &str) -> BTreeMap<String, usize> {
        count_by_field(self.kind, &self.records, field, fallback)
    }

    /// Shallow-merges `fields` into one record of the snapshot and refreshes the counters.
    pub(crate) fn patch_record(&mut self, id: &str, fields: &Map<String, Value>) -> Option<Record> {
        let record = self.records.iter_mut().find(|record| record.id == id)?;
        record.merge(fields);
        let patched = record.clone();
        self.counts = count_by_status(self.kind, &self.records);
        Some(patched)
    }

    fn is_current(&self, ticket: FetchTicket) -> bool {
        if ticket.0 == self.generation {
            return true;
        }
        tracing::debug!(view = %self.name, ticket = ticket.0, current = self.generation, "discarding stale fetch result");
        false
    }

    fn apply_records(&mut self, ticket: FetchTicket, records: Vec<Record>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let records = dedupe_by_id(&self.scope.collection, records);
        self.counts = count_by_status(self.kind, &records);
        self.records = records;
        self.load = LoadState::Ready;
        true
    }

    fn apply_failure(&mut self, ticket: FetchTicket, error: &AppError) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        tracing::warn!(view = %self.name, error = %error, "view fetch failed");
        self.load = LoadState::Failed {
            message: error.to_string(),
        };
        true
    }
}
