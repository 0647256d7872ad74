//! Driver seam: connections, connectors and the connector registry.
//!
//! polysql never opens sockets itself. A driver crate (or the bundled
//! Postgres adapter) implements [`Connector`] to hand out exclusive
//! [`Connection`]s, and reports failures as [`DriverError`] so the classifier
//! can map them to an [`ErrorKind`](crate::ErrorKind).

use crate::compiled::CompiledQuery;
use crate::config::DatabaseConfig;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::value::Row;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What the driver was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// Acquiring or establishing a connection.
    Connect,
    /// Running a statement.
    Execute,
    /// Running BEGIN / COMMIT / ROLLBACK / SAVEPOINT.
    Control,
}

/// Error reported by a driver, with its native code when available.
///
/// `code` is the SQLSTATE on Postgres, the error number on MySQL and MSSQL,
/// and the ORA number (`ORA-00001` or `1`) on Oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub phase: DriverPhase,
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(phase: DriverPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            code: None,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(DriverPhase::Connect, message)
    }

    pub fn execute(message: impl Into<String>) -> Self {
        Self::new(DriverPhase::Execute, message)
    }

    pub fn control(message: impl Into<String>) -> Self {
        Self::new(DriverPhase::Control, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Same error, re-tagged as a transaction-control failure.
    pub fn into_control(mut self) -> Self {
        if self.phase == DriverPhase::Execute {
            self.phase = DriverPhase::Control;
        }
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

/// An exclusive database connection.
///
/// Methods take `&mut self`: a connection serves one statement at a time.
#[async_trait]
pub trait Connection: Send {
    /// Run a statement and return its rows.
    ///
    /// For statements with `out_params`, the captured output values come back
    /// as a single row.
    async fn query(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, DriverError>;

    /// Run a statement and return the affected row count.
    async fn execute(&mut self, query: &CompiledQuery) -> Result<u64, DriverError>;

    /// Run unparameterised SQL (DDL, transaction control, migration scripts).
    async fn batch_execute(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Return the connection to its pool (or close it).
    async fn release(self: Box<Self>) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Hands out connections for one dialect.
#[async_trait]
pub trait Connector: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn acquire(&self) -> Result<Box<dyn Connection>, DriverError>;
}

type ConnectorFactory = Arc<dyn Fn(&DatabaseConfig) -> PolyResult<Arc<dyn Connector>> + Send + Sync>;

/// Connector factories keyed by dialect.
///
/// [`ConnectorRegistry::with_defaults`] registers the adapters compiled into
/// this crate (the Postgres adapter under the `postgres` feature); other
/// drivers register their own factory.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    factories: HashMap<Dialect, ConnectorFactory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled adapters.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "postgres")]
        registry.register(Dialect::Postgres, |config| {
            let connector = crate::postgres::PgConnector::from_config(config)?;
            Ok(Arc::new(connector) as Arc<dyn Connector>)
        });
        registry
    }

    pub fn register<F>(&mut self, dialect: Dialect, factory: F) -> &mut Self
    where
        F: Fn(&DatabaseConfig) -> PolyResult<Arc<dyn Connector>> + Send + Sync + 'static,
    {
        self.factories.insert(dialect, Arc::new(factory));
        self
    }

    pub fn contains(&self, dialect: Dialect) -> bool {
        self.factories.contains_key(&dialect)
    }

    /// Build a connector for `config.client`.
    pub fn connector(&self, config: &DatabaseConfig) -> PolyResult<Arc<dyn Connector>> {
        let factory = self.factories.get(&config.client).ok_or_else(|| {
            PolyError::config(format!(
                "no driver registered for client '{}'",
                config.client
            ))
        })?;
        let connector = factory(config)?;
        if connector.dialect() != config.client {
            return Err(PolyError::config(format!(
                "driver for '{}' reported dialect '{}'",
                config.client,
                connector.dialect()
            )));
        }
        Ok(connector)
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dialects: Vec<&str> = self.factories.keys().map(Dialect::as_str).collect();
        dialects.sort_unstable();
        f.debug_struct("ConnectorRegistry")
            .field("dialects", &dialects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = DriverError::execute("duplicate").with_code("23505");
        assert_eq!(err.to_string(), "[23505] duplicate");
        assert_eq!(DriverError::connect("refused").to_string(), "refused");
    }

    #[test]
    fn into_control_only_retags_execute() {
        assert_eq!(
            DriverError::execute("x").into_control().phase,
            DriverPhase::Control
        );
        assert_eq!(
            DriverError::connect("x").into_control().phase,
            DriverPhase::Connect
        );
    }

    #[test]
    fn missing_driver_is_a_config_error() {
        let registry = ConnectorRegistry::new();
        let config = DatabaseConfig::new(Dialect::Oracle);
        let err = registry.connector(&config).err().unwrap();
        assert!(matches!(err, PolyError::Config(_)));
    }
}
