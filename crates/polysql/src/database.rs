//! The [`Database`] handle.

use crate::compiled::CompiledQuery;
use crate::config::DatabaseConfig;
use crate::connection::{Connection, Connector, ConnectorRegistry};
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::executor::{Executor, execute_on, fetch_on, script_on};
use crate::trace::SqlTrace;
use crate::transaction::{Transaction, TransactionOptions, release};
use crate::value::Row;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

struct Inner {
    config: DatabaseConfig,
    connector: Arc<dyn Connector>,
    trace: SqlTrace,
}

/// A configured database: connector, dialect and SQL trace settings.
///
/// Cheap to clone. Statements run outside a transaction each borrow their
/// own connection, so clones can be used concurrently.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Build with the connectors compiled into this crate.
    pub fn connect(config: DatabaseConfig) -> PolyResult<Self> {
        Self::with_registry(config, &ConnectorRegistry::with_defaults())
    }

    pub fn with_registry(config: DatabaseConfig, registry: &ConnectorRegistry) -> PolyResult<Self> {
        let connector = registry.connector(&config)?;
        Ok(Self::from_connector(config, connector))
    }

    pub fn from_connector(config: DatabaseConfig, connector: Arc<dyn Connector>) -> Self {
        let trace = SqlTrace::from_debug(config.debug);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                trace,
            }),
        }
    }

    /// Replace the SQL trace settings (e.g. to disable truncation).
    pub fn with_trace(self, trace: SqlTrace) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: self.inner.config.clone(),
                connector: self.inner.connector.clone(),
                trace,
            }),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.config.client
    }

    async fn acquire(&self) -> PolyResult<Box<dyn Connection>> {
        self.inner
            .connector
            .acquire()
            .await
            .map_err(|e| PolyError::Connection(e.to_string()))
    }

    /// Open a transaction on a dedicated connection.
    pub async fn begin(&self, options: TransactionOptions) -> PolyResult<Transaction> {
        let conn = self.acquire().await?;
        Transaction::begin(conn, self.dialect(), self.inner.trace.clone(), &options).await
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The connection is released on every path after a successful begin.
    pub async fn transaction<T, F>(&self, f: F) -> PolyResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, PolyResult<T>> + Send,
    {
        self.transaction_with(TransactionOptions::default(), f).await
    }

    pub async fn transaction_with<T, F>(&self, options: TransactionOptions, f: F) -> PolyResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, PolyResult<T>> + Send,
    {
        let mut tx = self.begin(options).await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(error) => Err(tx.abort(error).await),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("client", &self.inner.config.client)
            .field("debug", &self.inner.config.debug)
            .finish()
    }
}

#[async_trait]
impl Executor for Database {
    fn dialect(&self) -> Dialect {
        self.inner.config.client
    }

    async fn fetch(&mut self, query: CompiledQuery) -> PolyResult<Vec<Row>> {
        let mut conn = self.acquire().await?;
        let result = fetch_on(conn.as_mut(), &self.inner.trace, &query).await;
        release(conn).await;
        result
    }

    async fn execute(&mut self, query: CompiledQuery) -> PolyResult<u64> {
        let mut conn = self.acquire().await?;
        let result = execute_on(conn.as_mut(), &self.inner.trace, &query).await;
        release(conn).await;
        result
    }

    async fn execute_script(&mut self, sql: &str) -> PolyResult<()> {
        let mut conn = self.acquire().await?;
        let result = script_on(conn.as_mut(), &self.inner.trace, self.dialect(), sql).await;
        release(conn).await;
        result
    }
}
