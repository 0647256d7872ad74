//! # polysql
//!
//! Dialect-agnostic SQL compilation and transaction coordination for
//! Postgres, MySQL, MSSQL and Oracle.
//!
//! - **One statement model**: build a [`Statement`] once, compile it for any [`Dialect`]
//! - **SQL apart from values**: every compiled statement is `(sql, bindings)`, never interpolated
//! - **Portable DDL**: [`Schema`] / [`Blueprint`] emit per-dialect statement lists
//!   (Oracle auto-increment becomes sequence + trigger)
//! - **Scoped transactions**: nested [`Transaction::transaction`] calls become savepoints
//! - **Classified errors**: driver failures map to a portable [`ErrorKind`]
//!
//! ```ignore
//! use polysql::{Database, DatabaseConfig, Record, Statement};
//!
//! let mut db = Database::connect(DatabaseConfig::load("polysql.toml")?)?;
//!
//! let rows = Statement::table("users")
//!     .select(["id", "name"])
//!     .where_eq("active", true)
//!     .order_by_desc("id")
//!     .limit(10)
//!     .get(&mut db)
//!     .await?;
//!
//! db.transaction(|tx| Box::pin(async move {
//!     Statement::table("users")
//!         .insert(tx, &[Record::new().set("name", "alice")])
//!         .await
//! }))
//! .await?;
//! ```

pub mod binder;
pub mod classify;
pub mod compiled;
pub mod config;
pub mod connection;
pub mod database;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod migrate;
pub mod schema;
pub mod seed;
pub mod statement;
pub mod trace;
pub mod transaction;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use binder::{PlaceholderStyle, SqlFragment};
pub use classify::{Classification, ErrorKind, classify};
pub use compiled::{CompileWarning, CompiledQuery, OutParam};
pub use config::DatabaseConfig;
pub use connection::{Connection, Connector, ConnectorRegistry, DriverError, DriverPhase};
pub use database::Database;
pub use dialect::Dialect;
pub use error::{PolyError, PolyResult};
pub use executor::Executor;
pub use migrate::{MigrationStatus, Migrator, make_migration, scan_migrations_dir};
pub use schema::{Blueprint, ColumnType, ForeignKey, Schema};
pub use seed::{make_seed, run_seeds};
pub use statement::{Direction, Operator, Statement};
pub use trace::SqlTrace;
pub use transaction::{IsolationLevel, Transaction, TransactionOptions, TransactionState};
pub use value::{Record, Row, Value};

#[cfg(feature = "postgres")]
pub use postgres::{PgConnector, PgConnectorOptions};
