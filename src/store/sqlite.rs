use super::{matches_predicates, DataStore};
use crate::errors::{AppError, AppResult};
use crate::models::{Predicate, Record, ID_FIELD};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Document store persisted in a single SQLite table. Fields are kept as
/// JSON; predicates are evaluated after decoding, in insertion order.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Upsert by `(collection, id)`; a replaced document keeps its position.
    pub fn insert(&self, collection: &str, record: &Record) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let fields_json = serde_json::to_string(&record.fields)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, id, fields_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET fields_json = excluded.fields_json, updated_at = excluded.updated_at",
            params![collection, record.id, fields_json, now],
        )?;
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &str) -> AppResult<Option<Record>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT fields_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        raw.map(|raw| decode_record(id, &raw)).transpose()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn load_collection(&self, collection: &str) -> AppResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut statement =
            conn.prepare("SELECT id, fields_json FROM documents WHERE collection = ?1 ORDER BY seq ASC")?;
        let rows = statement.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            match decode_record(&id, &raw) {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(collection, id = %id, error = %error, "skipping malformed document");
                }
            }
        }
        Ok(records)
    }
}

fn decode_record(id: &str, raw: &str) -> AppResult<Record> {
    let fields: Map<String, Value> = serde_json::from_str(raw)?;
    Ok(Record::new(id, fields))
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn query(&self, collection: &str, predicates: &[Predicate]) -> AppResult<Vec<Record>> {
        let mut records = self.load_collection(collection)?;
        records.retain(|record| matches_predicates(record, predicates));
        Ok(records)
    }

    async fn update(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> AppResult<()> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT fields_json FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?;

        let mut record = decode_record(id, &raw)?;
        record.merge(fields);
        conn.execute(
            "UPDATE documents SET fields_json = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![
                serde_json::to_string(&record.fields)?,
                Utc::now().to_rfc3339(),
                collection,
                id
            ],
        )?;
        Ok(())
    }

    async fn create(&self, collection: &str, mut fields: Map<String, Value>) -> AppResult<String> {
        fields.remove(ID_FIELD);
        let id = Uuid::new_v4().simple().to_string();
        self.insert(collection, &Record::new(id.clone(), fields))?;
        Ok(id)
    }
}
