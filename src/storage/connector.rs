use crate::domain::models::{Outcome, QueryResult, Record, Records, Table, Target};
use crate::error::{AppError, AppResult};
use crate::storage::{StoreBackend, StoreSession};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

enum ConnectionState {
    Never,
    Active(Arc<dyn StoreSession>),
    Closed,
}

/// Owns a session that has not been handed to the connector state.
struct SessionGuard {
    session: Arc<dyn StoreSession>,
    armed: bool,
}

impl SessionGuard {
    fn new(session: Arc<dyn StoreSession>) -> Self {
        Self { session, armed: true }
    }

    fn session(&self) -> &Arc<dyn StoreSession> {
        &self.session
    }

    async fn close(&mut self) {
        if std::mem::replace(&mut self.armed, false) {
            self.session.close().await;
        }
    }

    /// Hand the session over without closing it.
    fn release(mut self) -> Arc<dyn StoreSession> {
        self.armed = false;
        Arc::clone(&self.session)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Store call interrupted, closing its session");
                let session = Arc::clone(&self.session);
                handle.spawn(async move { session.close().await });
            }
            Err(_) => error!("Store session dropped outside a runtime and left open"),
        }
    }
}

/// Lazily connected access to one document store.
///
/// `query` and `insert` open a session when none is active and close it
/// again only if they opened it; a session opened with [`connect`] stays
/// open until [`close`]. The state lock is held for the whole
/// open/use/close sequence, so operations on one connector are serialized.
///
/// [`connect`]: StoreConnector::connect
/// [`close`]: StoreConnector::close
pub struct StoreConnector {
    backend: Arc<dyn StoreBackend>,
    defaults: Target,
    state: Mutex<ConnectionState>,
}

/// A validated collection bound to an active session.
pub struct CollectionHandle {
    session: Arc<dyn StoreSession>,
    database: String,
    collection: String,
}

impl CollectionHandle {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn find(&self, filter: Record) -> AppResult<Vec<Record>> {
        self.session.find(&self.database, &self.collection, filter).await
    }

    pub async fn insert_many(&self, records: Vec<Record>) -> AppResult<bool> {
        self.session.insert_many(&self.database, &self.collection, records).await
    }
}

impl StoreConnector {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self::with_target(backend, Target::default())
    }

    /// Connector with default database/collection used when a call omits them.
    pub fn with_target(backend: Arc<dyn StoreBackend>, defaults: Target) -> Self {
        Self {
            backend,
            defaults,
            state: Mutex::new(ConnectionState::Never),
        }
    }

    pub fn defaults(&self) -> &Target {
        &self.defaults
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Active(_))
    }

    /// Open and ping a session unless one is already active.
    pub async fn connect(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await.map(|_| ())
    }

    async fn connect_locked(&self, state: &mut ConnectionState) -> AppResult<Arc<dyn StoreSession>> {
        if let ConnectionState::Active(session) = state {
            return Ok(Arc::clone(session));
        }

        let session = self.open_verified().await?.release();
        *state = ConnectionState::Active(Arc::clone(&session));
        Ok(session)
    }

    /// Open a session and ping it. The session is owned by the returned guard
    /// and closed if the guard is dropped before being released.
    async fn open_verified(&self) -> AppResult<SessionGuard> {
        let session = self.backend.open().await.map_err(|e| {
            error!("Failed to open {} store session: {}", self.backend.name(), e);
            e
        })?;
        let mut guard = SessionGuard::new(session);

        if let Err(e) = guard.session().ping().await {
            guard.close().await;
            error!("Ping to {} store failed: {}", self.backend.name(), e);
            return Err(match e {
                AppError::Connection(_) => e,
                other => AppError::Connection(other.to_string()),
            });
        }

        info!("Pinged {} store, connection established", self.backend.name());
        Ok(guard)
    }

    /// Release the active session.
    ///
    /// Closing an already closed connector is a no-op; closing one that never
    /// connected is an error.
    pub async fn close(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, ConnectionState::Closed) {
            ConnectionState::Active(session) => {
                session.close().await;
                info!("Closed {} store connection", self.backend.name());
                Ok(())
            }
            ConnectionState::Closed => Ok(()),
            ConnectionState::Never => {
                *state = ConnectionState::Never;
                Err(AppError::Connection(
                    "close called on a connector that never connected".to_string(),
                ))
            }
        }
    }

    /// Resolve and validate a collection on the active session.
    pub async fn get_collection(
        &self,
        database: Option<&str>,
        collection: Option<&str>,
    ) -> AppResult<CollectionHandle> {
        let session = match &*self.state.lock().await {
            ConnectionState::Active(session) => Arc::clone(session),
            _ => return Err(AppError::Connection("Not connected".to_string())),
        };
        Self::resolve_collection(session, self.defaults.resolve(database, collection)).await
    }

    async fn resolve_collection(session: Arc<dyn StoreSession>, target: Target) -> AppResult<CollectionHandle> {
        let invalid = || AppError::InvalidTarget {
            database: target.database.clone().unwrap_or_default(),
            collection: target.collection.clone().unwrap_or_default(),
        };

        let (Some(database), Some(collection)) = (&target.database, &target.collection) else {
            return Err(invalid());
        };

        let names = session.list_collection_names(database).await?;
        if !names.iter().any(|name| name == collection) {
            return Err(invalid());
        }

        Ok(CollectionHandle {
            database: database.clone(),
            collection: collection.clone(),
            session,
        })
    }

    /// Run `op` on a session, opening one if needed and closing it afterwards
    /// only when this call opened it.
    ///
    /// A session opened here is never published as the active one; if the
    /// call is cancelled or `op` panics, its guard closes it.
    async fn scoped<T, F, Fut>(&self, op: F) -> AppResult<T>
    where
        F: FnOnce(Arc<dyn StoreSession>) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut state = self.state.lock().await;
        if let ConnectionState::Active(session) = &*state {
            return op(Arc::clone(session)).await;
        }

        let mut guard = self.open_verified().await?;
        *state = ConnectionState::Closed;

        let result = op(Arc::clone(guard.session())).await;

        guard.close().await;
        debug!("Closed {} store connection opened for this call", self.backend.name());
        result
    }

    fn absorb_invalid_target<T>(result: AppResult<T>, target: Target, operation: &str) -> AppResult<Outcome<T>> {
        match result {
            Ok(value) => Ok(Outcome::Done(value)),
            Err(err @ AppError::InvalidTarget { .. }) => {
                warn!("{} skipped: {}", operation, err);
                Ok(Outcome::InvalidTarget(target))
            }
            Err(err) => Err(err),
        }
    }

    /// Query a collection. `None` filter matches every record.
    pub async fn query(
        &self,
        filter: Option<Record>,
        database: Option<&str>,
        collection: Option<&str>,
        as_table: bool,
    ) -> AppResult<Outcome<QueryResult>> {
        let target = self.defaults.resolve(database, collection);
        let lookup = target.clone();

        let result = self
            .scoped(|session| async move {
                let handle = Self::resolve_collection(session, lookup).await?;
                let records = handle.find(filter.unwrap_or_default()).await?;
                debug!("query on {}.{} returned {} records", handle.database(), handle.collection(), records.len());

                Ok::<_, AppError>(if as_table {
                    QueryResult::Table(Table::from_records(&records))
                } else {
                    QueryResult::Records(records)
                })
            })
            .await;

        Self::absorb_invalid_target(result, target, "query")
    }

    /// Insert one record or many. `Done(true)` means every record was acknowledged.
    pub async fn insert(
        &self,
        records: impl Into<Records>,
        database: Option<&str>,
        collection: Option<&str>,
    ) -> AppResult<Outcome<bool>> {
        let Records(records) = records.into();
        let target = self.defaults.resolve(database, collection);
        let lookup = target.clone();

        let result = self
            .scoped(|session| async move {
                let handle = Self::resolve_collection(session, lookup).await?;
                if records.is_empty() {
                    return Ok(true);
                }

                let count = records.len();
                let acknowledged = handle.insert_many(records).await?;
                if acknowledged {
                    info!("Inserted {} records into {}.{}", count, handle.database(), handle.collection());
                } else {
                    warn!("Insert of {} records into {}.{} was not acknowledged", count, handle.database(), handle.collection());
                }
                Ok::<_, AppError>(acknowledged)
            })
            .await;

        Self::absorb_invalid_target(result, target, "insert")
    }
}
