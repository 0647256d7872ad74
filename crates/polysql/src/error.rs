//! Error types for polysql

use crate::classify::{ErrorKind, classify};
use crate::connection::{DriverError, DriverPhase};
use crate::dialect::Dialect;
use crate::value::Value;
use thiserror::Error;

/// Result type alias for polysql operations
pub type PolyResult<T> = Result<T, PolyError>;

/// Error types for compilation and database operations
#[derive(Debug, Error)]
pub enum PolyError {
    /// Failure establishing or tearing down a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure executing a DML/DDL statement
    #[error("Query error ({kind}): {cause} [sql: {sql}]")]
    Query {
        sql: String,
        bindings: Vec<Value>,
        kind: ErrorKind,
        cause: String,
    },

    /// Failure in BEGIN/COMMIT/ROLLBACK/SAVEPOINT control statements
    #[error("Transaction error during {operation}: {cause}")]
    Transaction { operation: String, cause: String },

    /// Column type not representable in the active dialect
    #[error("Unsupported type for {dialect}: {type_name} ({reason})")]
    UnsupportedType {
        dialect: Dialect,
        type_name: String,
        reason: String,
    },

    /// Clause or statement not representable in the active dialect
    #[error("Unsupported operation for {dialect}: {operation}")]
    UnsupportedOperation { dialect: Dialect, operation: String },

    /// Builder misuse (empty insert, unknown operator, bad identifier...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Migration or seed error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl PolyError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    pub fn unsupported_type(
        dialect: Dialect,
        type_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedType {
            dialect,
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported_operation(dialect: Dialect, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            dialect,
            operation: operation.into(),
        }
    }

    /// Create a transaction control error
    pub fn transaction(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Transaction {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// Wrap a driver failure for a statement, keeping the attempted SQL and bindings.
    ///
    /// The classifier decides the variant: connect-phase failures become
    /// [`PolyError::Connection`], control-phase failures become
    /// [`PolyError::Transaction`], everything else is a [`PolyError::Query`].
    /// A statement rejected because its transaction is unusable stays a
    /// `Query` with kind [`ErrorKind::Transaction`].
    pub fn from_driver(
        dialect: Dialect,
        sql: impl Into<String>,
        bindings: &[Value],
        err: DriverError,
    ) -> Self {
        let sql = sql.into();
        let classification = classify(dialect, &err);
        match (err.phase, classification.kind) {
            (DriverPhase::Connect, _) | (_, ErrorKind::Connection) => {
                Self::Connection(err.to_string())
            }
            (DriverPhase::Control, _) => Self::Transaction {
                operation: sql,
                cause: err.to_string(),
            },
            (DriverPhase::Execute, kind) => Self::Query {
                sql,
                bindings: bindings.to_vec(),
                kind,
                cause: err.to_string(),
            },
        }
    }

    /// Classified kind for query errors (`None` for non-driver errors).
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Query { kind, .. } => Some(*kind),
            Self::Connection(_) => Some(ErrorKind::Connection),
            Self::Transaction { .. } => Some(ErrorKind::Transaction),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.kind() == Some(ErrorKind::UniqueViolation)
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a transaction control error
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }

    /// Check if this error was raised during compilation (before any I/O)
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType { .. } | Self::UnsupportedOperation { .. } | Self::Validation(_)
        )
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_keeps_sql_and_bindings() {
        let err = DriverError::execute("duplicate key value").with_code("23505");
        let e = PolyError::from_driver(
            Dialect::Postgres,
            "INSERT INTO \"users\" (\"email\") VALUES ($1)",
            &[Value::from("a@b.c")],
            err,
        );
        match &e {
            PolyError::Query {
                sql,
                bindings,
                kind,
                ..
            } => {
                assert!(sql.starts_with("INSERT INTO"));
                assert_eq!(bindings, &vec![Value::from("a@b.c")]);
                assert_eq!(*kind, ErrorKind::UniqueViolation);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(e.is_unique_violation());
    }

    #[test]
    fn connect_phase_becomes_connection_error() {
        let err = DriverError::connect("connection refused");
        let e = PolyError::from_driver(Dialect::MySql, "SELECT 1", &[], err);
        assert!(e.is_connection());
    }

    #[test]
    fn control_phase_becomes_transaction_error() {
        let err = DriverError::control("no transaction in progress");
        let e = PolyError::from_driver(Dialect::Postgres, "COMMIT", &[], err);
        assert!(e.is_transaction());
    }

    #[test]
    fn statement_in_aborted_transaction_stays_a_query_error() {
        let err = DriverError::execute("current transaction is aborted").with_code("25P02");
        let e = PolyError::from_driver(
            Dialect::Postgres,
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2",
            &[Value::from("x"), Value::Int(1)],
            err,
        );
        match &e {
            PolyError::Query { bindings, kind, .. } => {
                assert_eq!(bindings, &vec![Value::from("x"), Value::Int(1)]);
                assert_eq!(*kind, ErrorKind::Transaction);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!e.is_transaction());
        assert_eq!(e.kind(), Some(ErrorKind::Transaction));
    }

    #[test]
    fn compile_errors_are_flagged() {
        assert!(PolyError::unsupported_type(Dialect::MySql, "timestampTz", "x").is_compile_error());
        assert!(!PolyError::config("x").is_compile_error());
    }
}
