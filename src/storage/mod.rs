pub mod connector;
pub mod memory;
pub mod mongo;

use crate::domain::models::Record;
use crate::error::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

pub use connector::{CollectionHandle, StoreConnector};

/// Factory for store sessions.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Create a session. The session is not verified until pinged.
    async fn open(&self) -> AppResult<Arc<dyn StoreSession>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// An established session with the document store.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Lightweight liveness round trip.
    async fn ping(&self) -> AppResult<()>;

    async fn list_collection_names(&self, database: &str) -> AppResult<Vec<String>>;

    async fn find(&self, database: &str, collection: &str, filter: Record) -> AppResult<Vec<Record>>;

    /// Returns true only when the store acknowledged every record.
    async fn insert_many(&self, database: &str, collection: &str, records: Vec<Record>) -> AppResult<bool>;

    /// Release the session. Must tolerate being called on a session that failed its ping.
    async fn close(&self);
}
