use crate::domain::models::Record;
use crate::error::{AppError, AppResult};
use crate::storage::{StoreBackend, StoreSession};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

type Databases = HashMap<String, HashMap<String, Vec<Record>>>;

/// In-memory document store for development and tests.
pub struct InMemoryBackend {
    databases: Arc<RwLock<Databases>>,
    unreachable: Arc<AtomicBool>,
    unacknowledged: Arc<AtomicBool>,
    open_sessions: Arc<AtomicUsize>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            databases: Arc::new(RwLock::new(HashMap::new())),
            unreachable: Arc::new(AtomicBool::new(false)),
            unacknowledged: Arc::new(AtomicBool::new(false)),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an empty collection (and its database) if absent.
    pub fn create_collection(&self, database: &str, collection: &str) -> AppResult<()> {
        let mut databases = self.databases.write()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    /// When set, sessions fail their ping.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// When set, writes are dropped and reported as not acknowledged.
    pub fn set_unacknowledged(&self, unacknowledged: bool) {
        self.unacknowledged.store(unacknowledged, Ordering::SeqCst);
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn count(&self, database: &str, collection: &str) -> usize {
        self.databases
            .read()
            .ok()
            .and_then(|dbs| dbs.get(database).and_then(|c| c.get(collection)).map(Vec::len))
            .unwrap_or(0)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for InMemoryBackend {
    async fn open(&self) -> AppResult<Arc<dyn StoreSession>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemorySession {
            databases: Arc::clone(&self.databases),
            unreachable: Arc::clone(&self.unreachable),
            unacknowledged: Arc::clone(&self.unacknowledged),
            open_sessions: Arc::clone(&self.open_sessions),
            closed: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct InMemorySession {
    databases: Arc<RwLock<Databases>>,
    unreachable: Arc<AtomicBool>,
    unacknowledged: Arc<AtomicBool>,
    open_sessions: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl InMemorySession {
    fn ensure_open(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Connection("Session already closed".to_string()));
        }
        Ok(())
    }

    fn matches(record: &Record, filter: &Record) -> bool {
        filter.iter().all(|(key, expected)| record.get(key) == Some(expected))
    }
}

#[async_trait]
impl StoreSession for InMemorySession {
    async fn ping(&self) -> AppResult<()> {
        self.ensure_open()?;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Connection("In-memory store marked unreachable".to_string()));
        }
        Ok(())
    }

    async fn list_collection_names(&self, database: &str) -> AppResult<Vec<String>> {
        self.ensure_open()?;
        let databases = self.databases.read()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        Ok(databases
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn find(&self, database: &str, collection: &str, filter: Record) -> AppResult<Vec<Record>> {
        self.ensure_open()?;
        let databases = self.databases.read()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        Ok(databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .map(|records| {
                records.iter()
                    .filter(|r| Self::matches(r, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_many(&self, database: &str, collection: &str, records: Vec<Record>) -> AppResult<bool> {
        self.ensure_open()?;
        let mut databases = self.databases.write()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        let stored = databases
            .get_mut(database)
            .and_then(|collections| collections.get_mut(collection))
            .ok_or_else(|| AppError::Store(format!("No collection {}.{}", database, collection)))?;

        if self.unacknowledged.load(Ordering::SeqCst) {
            return Ok(false);
        }

        for mut record in records {
            record
                .entry("_id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            stored.push(record);
        }
        Ok(true)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
