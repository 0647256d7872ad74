//! Transaction coordinator: one exclusively owned connection, savepoint
//! nesting and guaranteed release.
//!
//! ```ignore
//! let id = db
//!     .transaction(|tx| Box::pin(async move {
//!         Statement::table("accounts")
//!             .where_eq("id", 1)
//!             .update(tx, &Record::new().set("frozen", true))
//!             .await?;
//!
//!         // Failure inside rolls back to the savepoint only.
//!         let audit = tx
//!             .transaction(|tx| Box::pin(async move {
//!                 Statement::table("audit").insert(tx, &[Record::new().set("event", "freeze")]).await
//!             }))
//!             .await;
//!         if let Err(e) = audit {
//!             tracing::warn!("audit failed: {e}");
//!         }
//!         Ok(1)
//!     }))
//!     .await?;
//! ```

use crate::compiled::CompiledQuery;
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::executor::{Executor, execute_on, fetch_on, script_on};
use crate::trace::SqlTrace;
use crate::value::Row;
use async_trait::async_trait;
use futures_util::future::BoxFuture;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options applied when a transaction begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Runs the given block inside a transaction on `$db`.
///
/// - Begins via `$db.begin(TransactionOptions::default())`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the original error.
///
/// The block must evaluate to `polysql::PolyResult<T>`; `$tx` is a
/// `polysql::Transaction` usable as an executor via `&mut $tx`.
#[macro_export]
macro_rules! transaction {
    ($db:expr, $tx:ident, $body:block) => {{
        let mut $tx = ($db)
            .begin($crate::TransactionOptions::default())
            .await?;

        let __polysql_tx_body_result = async { $body }.await;
        match __polysql_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => Err($tx.abort(error).await),
        }
    }};
}

/// An open transaction.
///
/// Holds its connection exclusively until [`Transaction::commit`] or
/// [`Transaction::rollback`], both of which release it on every path.
pub struct Transaction {
    conn: Option<Box<dyn Connection>>,
    dialect: Dialect,
    trace: SqlTrace,
    savepoints: Vec<String>,
    state: TransactionState,
}

impl Transaction {
    /// Issue the begin statements on `conn`; the connection is released if that fails.
    pub async fn begin(
        mut conn: Box<dyn Connection>,
        dialect: Dialect,
        trace: SqlTrace,
        options: &TransactionOptions,
    ) -> PolyResult<Self> {
        let statements = match dialect.begin_statements(options) {
            Ok(statements) => statements,
            Err(e) => {
                release(conn).await;
                return Err(e);
            }
        };
        for sql in &statements {
            if let Err(e) = control(conn.as_mut(), &trace, dialect, sql).await {
                release(conn).await;
                return Err(e);
            }
        }
        tracing::debug!(
            target: "polysql.transaction",
            dialect = %dialect,
            isolation = ?options.isolation,
            read_only = options.read_only,
            "transaction started"
        );
        Ok(Self {
            conn: Some(conn),
            dialect,
            trace,
            savepoints: Vec::new(),
            state: TransactionState::Active,
        })
    }

    /// Nesting depth: 0 for the outer transaction, +1 per open savepoint.
    pub fn level(&self) -> usize {
        self.savepoints.len()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Name of the innermost open savepoint.
    pub fn current_savepoint(&self) -> Option<&str> {
        self.savepoints.last().map(String::as_str)
    }

    fn connection(&mut self) -> PolyResult<&mut (dyn Connection + 'static)> {
        if self.state != TransactionState::Active {
            return Err(PolyError::transaction(
                "statement",
                format!("transaction is {:?}", self.state),
            ));
        }
        self.conn
            .as_deref_mut()
            .ok_or_else(|| PolyError::transaction("statement", "connection already released"))
    }

    async fn control(&mut self, sql: &str) -> PolyResult<()> {
        let dialect = self.dialect;
        let trace = self.trace.clone();
        let conn = self.connection()?;
        control(conn, &trace, dialect, sql).await
    }

    /// Run `f` inside a savepoint.
    ///
    /// On `Ok` the savepoint is released; on `Err` the work since the
    /// savepoint is rolled back and the error is returned to the caller,
    /// leaving the enclosing transaction active.
    pub async fn transaction<T, F>(&mut self, f: F) -> PolyResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, PolyResult<T>> + Send,
    {
        let depth = self.level();
        let name = format!("sp_{}", depth + 1);
        let sql = self.dialect.savepoint_sql(&name);
        self.control(&sql).await?;
        self.savepoints.push(name.clone());
        tracing::debug!(
            target: "polysql.transaction",
            savepoint = %name,
            level = depth + 1,
            "savepoint created"
        );

        let result = f(self).await;
        self.savepoints.truncate(depth);

        match result {
            Ok(value) => {
                if let Some(sql) = self.dialect.release_savepoint_sql(&name) {
                    self.control(&sql).await?;
                }
                tracing::debug!(target: "polysql.transaction", savepoint = %name, "savepoint released");
                Ok(value)
            }
            Err(error) => {
                let sql = self.dialect.rollback_to_savepoint_sql(&name);
                match self.control(&sql).await {
                    Ok(()) => {
                        tracing::debug!(
                            target: "polysql.transaction",
                            savepoint = %name,
                            error = %error,
                            "rolled back to savepoint"
                        );
                        Err(error)
                    }
                    Err(rollback_err) => Err(PolyError::transaction(
                        sql,
                        format!("{error} (savepoint rollback failed: {rollback_err})"),
                    )),
                }
            }
        }
    }

    /// Commit and release the connection.
    pub async fn commit(mut self) -> PolyResult<()> {
        let sql = self.dialect.commit_sql();
        let result = self.control(sql).await;
        self.finish(TransactionState::Committed, result).await
    }

    /// Roll back and release the connection.
    pub async fn rollback(mut self) -> PolyResult<()> {
        let sql = self.dialect.rollback_sql();
        let result = self.control(sql).await;
        self.finish(TransactionState::RolledBack, result).await
    }

    /// Roll back after `error` and hand the error back.
    ///
    /// A failing ROLLBACK is logged; `error` is still what the caller sees.
    pub async fn abort(self, error: PolyError) -> PolyError {
        if let Err(rollback_err) = self.rollback().await {
            tracing::error!(
                target: "polysql.transaction",
                error = %error,
                rollback_error = %rollback_err,
                "rollback failed"
            );
        }
        error
    }

    async fn finish(
        &mut self,
        state: TransactionState,
        result: PolyResult<()>,
    ) -> PolyResult<()> {
        self.state = state;
        self.savepoints.clear();
        if let Some(conn) = self.conn.take() {
            release(conn).await;
        }
        tracing::debug!(
            target: "polysql.transaction",
            state = ?state,
            ok = result.is_ok(),
            "transaction finished"
        );
        result
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("dialect", &self.dialect)
            .field("savepoints", &self.savepoints)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active && self.conn.is_some() {
            // The driver discards the open transaction when the connection closes.
            tracing::warn!(
                target: "polysql.transaction",
                dialect = %self.dialect,
                level = self.level(),
                "transaction dropped without commit or rollback"
            );
        }
    }
}

#[async_trait]
impl Executor for Transaction {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch(&mut self, query: CompiledQuery) -> PolyResult<Vec<Row>> {
        let trace = self.trace.clone();
        fetch_on(self.connection()?, &trace, &query).await
    }

    async fn execute(&mut self, query: CompiledQuery) -> PolyResult<u64> {
        let trace = self.trace.clone();
        execute_on(self.connection()?, &trace, &query).await
    }

    async fn execute_script(&mut self, sql: &str) -> PolyResult<()> {
        let dialect = self.dialect;
        let trace = self.trace.clone();
        script_on(self.connection()?, &trace, dialect, sql).await
    }
}

/// Run a control statement; failures become [`PolyError::Transaction`].
async fn control(
    conn: &mut dyn Connection,
    trace: &SqlTrace,
    dialect: Dialect,
    sql: &str,
) -> PolyResult<()> {
    trace.script(dialect, sql);
    conn.batch_execute(sql)
        .await
        .map_err(|e| PolyError::from_driver(dialect, sql, &[], e.into_control()))
}

/// Return a connection, logging failures; release errors never mask the outcome.
pub(crate) async fn release(conn: Box<dyn Connection>) {
    if let Err(e) = conn.release().await {
        tracing::warn!(target: "polysql.transaction", error = %e, "failed to release connection");
    }
}
