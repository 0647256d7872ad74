//! The [`Executor`] seam: anything that can run compiled statements.
//!
//! Implemented by [`Database`](crate::Database) (one pooled connection per
//! statement) and [`Transaction`](crate::Transaction) (its own connection).

use crate::compiled::CompiledQuery;
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::trace::SqlTrace;
use crate::value::{Row, Value};
use async_trait::async_trait;

#[async_trait]
pub trait Executor: Send {
    fn dialect(&self) -> Dialect;

    /// Run a statement and return its rows.
    async fn fetch(&mut self, query: CompiledQuery) -> PolyResult<Vec<Row>>;

    /// Run a statement and return the affected row count.
    async fn execute(&mut self, query: CompiledQuery) -> PolyResult<u64>;

    /// Run unparameterised SQL such as DDL or a migration file.
    async fn execute_script(&mut self, sql: &str) -> PolyResult<()>;

    /// Run caller-written SQL with canonical `?` markers and return rows.
    async fn fetch_raw(&mut self, sql: &str, bindings: Vec<Value>) -> PolyResult<Vec<Row>> {
        let query = CompiledQuery::raw(self.dialect(), sql, bindings)?;
        self.fetch(query).await
    }

    /// Run caller-written SQL with canonical `?` markers and return the row count.
    async fn execute_raw(&mut self, sql: &str, bindings: Vec<Value>) -> PolyResult<u64> {
        let query = CompiledQuery::raw(self.dialect(), sql, bindings)?;
        self.execute(query).await
    }
}

pub(crate) async fn fetch_on(
    conn: &mut dyn Connection,
    trace: &SqlTrace,
    query: &CompiledQuery,
) -> PolyResult<Vec<Row>> {
    trace.statement(query);
    conn.query(query)
        .await
        .map_err(|e| PolyError::from_driver(query.dialect, &query.sql, &query.bindings, e))
}

pub(crate) async fn execute_on(
    conn: &mut dyn Connection,
    trace: &SqlTrace,
    query: &CompiledQuery,
) -> PolyResult<u64> {
    trace.statement(query);
    conn.execute(query)
        .await
        .map_err(|e| PolyError::from_driver(query.dialect, &query.sql, &query.bindings, e))
}

pub(crate) async fn script_on(
    conn: &mut dyn Connection,
    trace: &SqlTrace,
    dialect: Dialect,
    sql: &str,
) -> PolyResult<()> {
    trace.script(dialect, sql);
    conn.batch_execute(sql)
        .await
        .map_err(|e| PolyError::from_driver(dialect, sql, &[], e))
}
