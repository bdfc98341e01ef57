use super::{matches_predicates, DataStore};
use crate::errors::{AppError, AppResult};
use crate::models::{Predicate, Record};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Faults {
    queries: HashSet<String>,
    updates: HashSet<String>,
    creates: HashSet<String>,
}

/// Process-local document store. Collections keep insertion order.
///
/// Failures can be injected per collection and operation so callers can
/// exercise their error paths without a real backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
    faults: RwLock<Faults>,
    query_count: AtomicU64,
    update_count: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces by id, keeping the original position on replace.
    pub async fn insert(&self, collection: &str, record: Record) {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        match entries.iter_mut().find(|entry| entry.id == record.id) {
            Some(existing) => *existing = record,
            None => entries.push(record),
        }
    }

    pub async fn insert_all(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.insert(collection, record).await;
        }
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Record> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|entries| entries.iter().find(|entry| entry.id == id))
            .cloned()
    }

    pub async fn all(&self, collection: &str) -> Vec<Record> {
        let collections = self.collections.read().await;
        collections.get(collection).cloned().unwrap_or_default()
    }

    pub async fn fail_queries_on(&self, collection: &str) {
        self.faults.write().await.queries.insert(collection.to_string());
    }

    pub async fn fail_updates_on(&self, collection: &str) {
        self.faults.write().await.updates.insert(collection.to_string());
    }

    pub async fn fail_creates_on(&self, collection: &str) {
        self.faults.write().await.creates.insert(collection.to_string());
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn query(&self, collection: &str, predicates: &[Predicate]) -> AppResult<Vec<Record>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.queries.contains(collection) {
            return Err(AppError::Io(format!("query on '{}' unavailable", collection)));
        }
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| matches_predicates(entry, predicates))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> AppResult<()> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.updates.contains(collection) {
            return Err(AppError::Io(format!("update on '{}' unavailable", collection)));
        }
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|entry| entry.id == id))
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?;
        record.merge(fields);
        Ok(())
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> AppResult<String> {
        if self.faults.read().await.creates.contains(collection) {
            return Err(AppError::Io(format!("create on '{}' unavailable", collection)));
        }
        let id = Uuid::new_v4().simple().to_string();
        self.insert(collection, Record::new(id.clone(), fields)).await;
        Ok(id)
    }
}
