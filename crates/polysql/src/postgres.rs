//! Postgres adapter: `tokio-postgres` connections from a `deadpool-postgres` pool.
//!
//! ```ignore
//! let config = DatabaseConfig::new(Dialect::Postgres)
//!     .with_connection("url", "postgres://app@localhost/app")
//!     .with_connection("pool_max_size", 8);
//! let db = Database::connect(config)?;
//! ```

use crate::compiled::CompiledQuery;
use crate::config::DatabaseConfig;
use crate::connection::{Connection, Connector, DriverError};
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::value::{Row, Value};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::NoTls;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// Pool settings, read from the `connection` table.
#[derive(Debug, Clone)]
pub struct PgConnectorOptions {
    pub max_size: usize,
    pub recycling_method: RecyclingMethod,
}

impl Default for PgConnectorOptions {
    fn default() -> Self {
        Self {
            max_size: 16,
            recycling_method: RecyclingMethod::Fast,
        }
    }
}

impl PgConnectorOptions {
    /// `pool_max_size` and `pool_recycling` (`"fast"` / `"verified"`).
    pub fn from_config(config: &DatabaseConfig) -> PolyResult<Self> {
        let mut options = Self::default();
        if let Some(size) = config.connection.get("pool_max_size") {
            options.max_size = size
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| PolyError::config("pool_max_size must be a positive integer"))?;
        }
        match config.option_str("pool_recycling") {
            None | Some("fast") => {}
            Some("verified") => options.recycling_method = RecyclingMethod::Verified,
            Some(other) => {
                return Err(PolyError::config(format!(
                    "unknown pool_recycling '{other}' (expected fast or verified)"
                )));
            }
        }
        Ok(options)
    }
}

fn pg_config(config: &DatabaseConfig) -> PolyResult<tokio_postgres::Config> {
    if let Some(url) = config.url() {
        return url
            .parse()
            .map_err(|e: tokio_postgres::Error| PolyError::config(format!("invalid url: {e}")));
    }
    let mut pg = tokio_postgres::Config::new();
    pg.host(config.option_str("host").unwrap_or("localhost"));
    if let Some(port) = config.connection.get("port") {
        let port = port
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| PolyError::config("port must be an integer between 0 and 65535"))?;
        pg.port(port);
    }
    if let Some(user) = config.option_str("user") {
        pg.user(user);
    }
    if let Some(password) = config.option_str("password") {
        pg.password(password);
    }
    if let Some(dbname) = config.option_str("database") {
        pg.dbname(dbname);
    }
    Ok(pg)
}

/// [`Connector`] backed by a `deadpool-postgres` pool (no TLS).
#[derive(Clone)]
pub struct PgConnector {
    pool: Pool,
}

impl PgConnector {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from `connection.url` or `host`/`port`/`user`/`password`/`database`.
    pub fn from_config(config: &DatabaseConfig) -> PolyResult<Self> {
        let options = PgConnectorOptions::from_config(config)?;
        let manager = Manager::from_config(
            pg_config(config)?,
            NoTls,
            ManagerConfig {
                recycling_method: options.recycling_method,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(options.max_size)
            .build()
            .map_err(|e| PolyError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl Connector for PgConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn acquire(&self) -> Result<Box<dyn Connection>, DriverError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DriverError::connect(e.to_string()))?;
        Ok(Box::new(PgConnection { client }))
    }
}

/// A pooled client; dropping it returns it to the pool.
pub struct PgConnection {
    client: deadpool_postgres::Object,
}

fn driver_error(e: tokio_postgres::Error) -> DriverError {
    if let Some(db) = e.as_db_error() {
        return DriverError::execute(db.message()).with_code(db.code().code());
    }
    if e.is_closed() {
        // connection_failure
        return DriverError::execute(e.to_string()).with_code("08006");
    }
    DriverError::execute(e.to_string())
}

fn params(query: &CompiledQuery) -> Vec<&(dyn ToSql + Sync)> {
    query
        .bindings
        .iter()
        .map(|v| v as &(dyn ToSql + Sync))
        .collect()
}

fn convert_rows(rows: &[tokio_postgres::Row]) -> Result<Vec<Row>, DriverError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|i| row.try_get::<_, PgCell>(i).map(|cell| cell.0))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DriverError::execute(format!("failed to decode row: {e}")))?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

#[async_trait]
impl Connection for PgConnection {
    async fn query(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, DriverError> {
        let params = params(query);
        let rows = self
            .client
            .query(query.sql.as_str(), &params)
            .await
            .map_err(driver_error)?;
        convert_rows(&rows)
    }

    async fn execute(&mut self, query: &CompiledQuery) -> Result<u64, DriverError> {
        let params = params(query);
        self.client
            .execute(query.sql.as_str(), &params)
            .await
            .map_err(driver_error)
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.client.batch_execute(sql).await.map_err(driver_error)
    }
}

// ==================== Value <-> wire format ====================

/// Parse decimal text for a NUMERIC parameter.
fn numeric(s: &str) -> Result<Decimal, BoxError> {
    let s = s.trim();
    s.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| format!("invalid numeric literal {s:?}: {e}").into())
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 => Value::Int(i64::from(*b)).to_sql(ty, out),
                _ => b.to_sql_checked(ty, out),
            },
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql_checked(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql_checked(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql_checked(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql_checked(ty, out),
                Type::BOOL => (*i != 0).to_sql_checked(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql_checked(ty, out),
                _ if <&str as ToSql>::accepts(ty) => i.to_string().as_str().to_sql_checked(ty, out),
                _ => i.to_sql_checked(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql_checked(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql_checked(ty, out),
                _ => f.to_sql_checked(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::UUID => uuid::Uuid::parse_str(s)?.to_sql_checked(ty, out),
                Type::NUMERIC => numeric(s)?.to_sql_checked(ty, out),
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql_checked(ty, out)
                }
                _ => s.as_str().to_sql_checked(ty, out),
            },
            Value::Bytes(b) => b.as_slice().to_sql_checked(ty, out),
            Value::Json(j) => match *ty {
                Type::JSON | Type::JSONB => j.to_sql_checked(ty, out),
                _ => j.to_string().as_str().to_sql_checked(ty, out),
            },
            Value::Timestamp(t) => t.to_sql_checked(ty, out),
            Value::TimestampTz(t) => t.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// One decoded result column.
struct PgCell(Value);

impl<'a> FromSql<'a> for PgCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::OID => Value::Int(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Value::Text(Decimal::from_sql(ty, raw)?.to_string()),
            Type::BYTEA => Value::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::DATE => Value::Text(NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::UUID => Value::Text(uuid::Uuid::from_sql(ty, raw)?.to_string()),
            _ if <&str as FromSql>::accepts(ty) => Value::Text(<&str>::from_sql(ty, raw)?.to_string()),
            _ => return Err(format!("unsupported column type: {ty}").into()),
        };
        Ok(PgCell(value))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(PgCell(Value::Null))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
