//! In-memory recording connection shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use polysql::{
    CompiledQuery, Connection, Connector, Database, DatabaseConfig, Dialect, DriverError, Row,
    Value,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub sql: String,
    pub bindings: Vec<Value>,
}

#[derive(Default)]
struct State {
    log: Vec<Entry>,
    failures: Vec<(String, DriverError)>,
    responses: Vec<(String, Vec<Row>)>,
    acquired: usize,
    released: usize,
    refuse_connect: bool,
}

/// Records every statement; fails or answers statements containing a pattern.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(&self, dialect: Dialect) -> Database {
        Database::from_connector(
            DatabaseConfig::new(dialect),
            Arc::new(RecordingConnector {
                dialect,
                recorder: self.clone(),
            }),
        )
    }

    /// Statements containing `pattern` fail with `error`.
    pub fn fail_on(&self, pattern: &str, error: DriverError) {
        let mut state = self.state.lock().unwrap();
        state.failures.push((pattern.to_string(), error));
    }

    /// Queries containing `pattern` return `rows` (first match wins).
    pub fn respond(&self, pattern: &str, rows: Vec<Row>) {
        let mut state = self.state.lock().unwrap();
        state.responses.push((pattern.to_string(), rows));
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connect = true;
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn sqls(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.sql).collect()
    }

    pub fn acquired(&self) -> usize {
        self.state.lock().unwrap().acquired
    }

    pub fn released(&self) -> usize {
        self.state.lock().unwrap().released
    }

    fn record(&self, sql: &str, bindings: &[Value]) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(Entry {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        match state.failures.iter().find(|(p, _)| sql.contains(p.as_str())) {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn rows_for(&self, sql: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state
            .responses
            .iter()
            .find(|(p, _)| sql.contains(p.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }
}

/// One row with the given columns.
pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    Row::new(columns, values)
}

struct RecordingConnector {
    dialect: Dialect,
    recorder: Recorder,
}

#[async_trait]
impl Connector for RecordingConnector {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn acquire(&self) -> Result<Box<dyn Connection>, DriverError> {
        let mut state = self.recorder.state.lock().unwrap();
        if state.refuse_connect {
            return Err(DriverError::connect("connection refused").with_code("08001"));
        }
        state.acquired += 1;
        Ok(Box::new(RecordingConnection {
            recorder: self.recorder.clone(),
        }))
    }
}

struct RecordingConnection {
    recorder: Recorder,
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn query(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, DriverError> {
        self.recorder.record(&query.sql, &query.bindings)?;
        Ok(self.recorder.rows_for(&query.sql))
    }

    async fn execute(&mut self, query: &CompiledQuery) -> Result<u64, DriverError> {
        self.recorder.record(&query.sql, &query.bindings)?;
        Ok(1)
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.recorder.record(sql, &[])
    }

    async fn release(self: Box<Self>) -> Result<(), DriverError> {
        self.recorder.state.lock().unwrap().released += 1;
        Ok(())
    }
}
