//! SQL tracing: every statement polysql sends to a driver is emitted as a
//! `tracing` event on the `polysql.sql` target.

use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use tracing::Level;

/// Default maximum SQL length (in bytes) shown in events.
pub const DEFAULT_MAX_SQL_LENGTH: usize = 500;

/// The type of SQL operation, derived from the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Control,
    Other,
}

impl QueryType {
    pub fn detect(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "WITH" => QueryType::Select,
            "INSERT" => QueryType::Insert,
            "UPDATE" => QueryType::Update,
            "DELETE" => QueryType::Delete,
            "CREATE" | "ALTER" | "DROP" | "RENAME" | "IF" | "EXEC" => QueryType::Ddl,
            "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "SAVE" | "RELEASE"
            | "SET" => QueryType::Control,
            _ => QueryType::Other,
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Emits executed SQL as `tracing` events.
///
/// With `debug = true` in the config, events are at DEBUG; otherwise TRACE,
/// so they only show up when explicitly enabled (`RUST_LOG=polysql.sql=trace`).
#[derive(Debug, Clone)]
pub struct SqlTrace {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlTrace {
    fn default() -> Self {
        Self {
            level: Level::TRACE,
            max_sql_length: Some(DEFAULT_MAX_SQL_LENGTH),
        }
    }
}

impl SqlTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level from the `debug` config flag.
    pub fn from_debug(debug: bool) -> Self {
        let trace = Self::default();
        if debug { trace.level(Level::DEBUG) } else { trace }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Trace a compiled statement and surface its compile warnings.
    pub fn statement(&self, query: &CompiledQuery) {
        for warning in &query.warnings {
            tracing::warn!(
                target: "polysql.sql",
                dialect = %query.dialect,
                warning = %warning,
                sql = %self.truncate_sql(&query.sql),
                "compile warning"
            );
        }
        let bindings = tracing::field::debug(&query.bindings);
        self.emit(
            query.dialect,
            QueryType::detect(&query.sql),
            query.bindings.len(),
            &query.sql,
            bindings,
        );
    }

    /// Trace unparameterised SQL (DDL, control statements, scripts).
    pub fn script(&self, dialect: Dialect, sql: &str) {
        let bindings = tracing::field::debug(&[] as &[crate::value::Value]);
        self.emit(dialect, QueryType::detect(sql), 0, sql, bindings);
    }

    fn emit<B: std::fmt::Debug>(
        &self,
        dialect: Dialect,
        query_type: QueryType,
        param_count: usize,
        sql: &str,
        bindings: tracing::field::DebugValue<B>,
    ) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        emit_at_level!(
            self.level,
            target: "polysql.sql",
            dialect = %dialect,
            query_type = ?query_type,
            param_count,
            sql = %sql,
            bindings = bindings,
        );
    }
}
