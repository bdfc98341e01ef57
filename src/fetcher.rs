use crate::errors::{AppError, AppResult};
use crate::models::{FetchRequest, Predicate, Record, ReferenceJoin};
use crate::store::{DataStore, Identity};
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct CollectionFetcher {
    store: Arc<dyn DataStore>,
}

impl CollectionFetcher {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// Full matching set for `collection`. Duplicate ids are collapsed to their first occurrence.
    pub async fn fetch(&self, collection: &str, predicates: &[Predicate]) -> AppResult<Vec<Record>> {
        let started = Instant::now();
        let records = self.store.query(collection, predicates).await.map_err(|error| {
            tracing::warn!(collection, error = %error, "collection fetch failed");
            match error {
                AppError::Fetch(message) => AppError::Fetch(message),
                other => AppError::Fetch(format!("{}: {}", collection, other)),
            }
        })?;

        let records = dedupe_by_id(collection, records);
        tracing::debug!(
            collection,
            predicates = predicates.len(),
            count = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collection fetched"
        );
        Ok(records)
    }

    /// Fetch limited to records whose `owner_field` equals the current user's id.
    /// Returns `Ok(None)` without touching the store when nobody is signed in.
    pub async fn fetch_scoped(
        &self,
        identity: &dyn Identity,
        collection: &str,
        owner_field: &str,
        predicates: &[Predicate],
    ) -> AppResult<Option<Vec<Record>>> {
        let Some(user) = identity.current_user().await else {
            tracing::debug!(collection, "no current user, skipping scoped fetch");
            return Ok(None);
        };

        let mut scoped = Vec::with_capacity(predicates.len() + 1);
        scoped.push(Predicate::eq(owner_field, user.id));
        scoped.extend_from_slice(predicates);
        self.fetch(collection, &scoped).await.map(Some)
    }

    /// Issues every request concurrently; each result is reported independently, in request order.
    pub async fn fetch_all(&self, requests: &[FetchRequest]) -> Vec<AppResult<Vec<Record>>> {
        join_all(
            requests
                .iter()
                .map(|request| self.fetch(&request.collection, &request.predicates)),
        )
        .await
    }

    /// Copies `join.target_field` from each referenced record into `join.as_field`.
    /// One lookup per distinct referenced id, run concurrently; failed or empty lookups leave the field unset.
    pub async fn resolve_references(&self, records: &mut [Record], join: &ReferenceJoin) {
        let ids: BTreeSet<String> = records
            .iter()
            .filter_map(|record| record.text(&join.source_field))
            .collect();
        if ids.is_empty() {
            return;
        }

        let lookups = ids.iter().map(|id| async move {
            let result = self
                .store
                .query(&join.collection, &[Predicate::eq("id", id.as_str())])
                .await;
            (id.clone(), result)
        });

        let mut resolved: HashMap<String, Value> = HashMap::new();
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(found) => {
                    if let Some(value) = found.first().and_then(|record| record.get(&join.target_field)) {
                        resolved.insert(id, value.clone());
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        collection = %join.collection,
                        id = %id,
                        error = %error,
                        "reference lookup failed"
                    );
                }
            }
        }

        for record in records.iter_mut() {
            let Some(id) = record.text(&join.source_field) else {
                continue;
            };
            if let Some(value) = resolved.get(&id) {
                record.fields.insert(join.as_field.clone(), value.clone());
            }
        }
    }
}

/// Keeps the first record for each id.
pub(crate) fn dedupe_by_id(collection: &str, records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    let before = records.len();
    let unique: Vec<Record> = records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect();
    if unique.len() != before {
        tracing::warn!(collection, dropped = before - unique.len(), "duplicate record ids in fetch result");
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrentUser;
    use crate::store::memory::InMemoryStore;
    use crate::store::StaticIdentity;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).expect("record")
    }

    fn user(id: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            display_name: None,
        }
    }

    async fn seeded() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_all(
                "projects",
                [
                    record(json!({"id": "p1", "clientId": "c1", "managerId": "m1"})),
                    record(json!({"id": "p2", "clientId": "c2", "managerId": "m2"})),
                    record(json!({"id": "p3", "clientId": "c1", "managerId": "m1"})),
                    record(json!({"id": "p4", "clientId": "c1"})),
                ],
            )
            .await;
        store
            .insert_all(
                "users",
                [
                    record(json!({"id": "m1", "name": "Maya"})),
                    record(json!({"id": "c1", "name": "Client One"})),
                ],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn scoped_fetch_filters_by_current_user() {
        let store = seeded().await;
        let fetcher = CollectionFetcher::new(store.clone());
        let identity = StaticIdentity::signed_in(user("c1"));

        let owned = fetcher
            .fetch_scoped(&identity, "projects", "clientId", &[])
            .await
            .expect("fetch")
            .expect("signed in");
        assert_eq!(owned.len(), 3);
    }

    #[tokio::test]
    async fn scoped_fetch_is_skipped_without_user() {
        let store = seeded().await;
        let fetcher = CollectionFetcher::new(store.clone());

        let result = fetcher
            .fetch_scoped(&StaticIdentity::signed_out(), "projects", "clientId", &[])
            .await
            .expect("fetch");
        assert!(result.is_none());
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn fetch_all_reports_failures_independently() {
        let store = seeded().await;
        store.fail_queries_on("users").await;
        let fetcher = CollectionFetcher::new(store.clone());

        let results = fetcher
            .fetch_all(&[
                FetchRequest::new("projects", vec![]),
                FetchRequest::new("users", vec![]),
                FetchRequest::new("tasks", vec![]),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().expect("projects").len(), 4);
        let error = results[1].as_ref().expect_err("users failed");
        assert!(error.to_string().starts_with("FETCH_FAILED"));
        assert!(results[2].as_ref().expect("tasks").is_empty());
    }

    #[tokio::test]
    async fn references_resolve_once_per_distinct_id() {
        let store = seeded().await;
        let fetcher = CollectionFetcher::new(store.clone());
        let mut projects = fetcher.fetch("projects", &[]).await.expect("projects");
        let before = store.query_count();

        fetcher
            .resolve_references(
                &mut projects,
                &ReferenceJoin {
                    source_field: "managerId".to_string(),
                    collection: "users".to_string(),
                    target_field: "name".to_string(),
                    as_field: "managerName".to_string(),
                },
            )
            .await;

        assert_eq!(store.query_count() - before, 2);
        assert_eq!(projects[0].text("managerName").as_deref(), Some("Maya"));
        assert_eq!(projects[2].text("managerName").as_deref(), Some("Maya"));
        assert!(projects[1].get("managerName").is_none());
        assert!(projects[3].get("managerName").is_none());
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let unique = dedupe_by_id(
            "tasks",
            vec![
                record(json!({"id": "a", "v": 1})),
                record(json!({"id": "b"})),
                record(json!({"id": "a", "v": 2})),
            ],
        );
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].text("v").as_deref(), Some("1"));
    }
}
