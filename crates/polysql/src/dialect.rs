//! Supported SQL dialects and their transaction-control syntax.

use crate::error::{PolyError, PolyResult};
use crate::grammar::query::{MsSqlGrammar, MySqlGrammar, OracleGrammar, PostgresGrammar, QueryGrammar};
use crate::grammar::schema::{
    MsSqlSchemaGrammar, MySqlSchemaGrammar, OracleSchemaGrammar, PostgresSchemaGrammar,
    SchemaGrammar,
};
use crate::transaction::{IsolationLevel, TransactionOptions};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    MsSql,
    Oracle,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::MsSql,
        Dialect::Oracle,
    ];

    /// Name as written in the `client` config field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::Oracle => "oracle",
        }
    }

    /// Query grammar strategy for this dialect.
    pub fn query_grammar(&self) -> &'static dyn QueryGrammar {
        match self {
            Dialect::Postgres => &PostgresGrammar,
            Dialect::MySql => &MySqlGrammar,
            Dialect::MsSql => &MsSqlGrammar,
            Dialect::Oracle => &OracleGrammar,
        }
    }

    /// Schema grammar strategy for this dialect.
    pub fn schema_grammar(&self) -> &'static dyn SchemaGrammar {
        match self {
            Dialect::Postgres => &PostgresSchemaGrammar,
            Dialect::MySql => &MySqlSchemaGrammar,
            Dialect::MsSql => &MsSqlSchemaGrammar,
            Dialect::Oracle => &OracleSchemaGrammar,
        }
    }

    /// Statements that open a transaction, in execution order.
    pub fn begin_statements(&self, options: &TransactionOptions) -> PolyResult<Vec<String>> {
        let isolation = options.isolation.map(IsolationLevel::as_sql);
        match self {
            Dialect::Postgres => {
                let mut sql = "BEGIN".to_string();
                if let Some(level) = isolation {
                    sql.push_str(" ISOLATION LEVEL ");
                    sql.push_str(level);
                }
                if options.read_only {
                    sql.push_str(" READ ONLY");
                }
                Ok(vec![sql])
            }
            Dialect::MySql => {
                let mut out = Vec::new();
                if let Some(level) = isolation {
                    out.push(format!("SET TRANSACTION ISOLATION LEVEL {level}"));
                }
                out.push(if options.read_only {
                    "START TRANSACTION READ ONLY".to_string()
                } else {
                    "START TRANSACTION".to_string()
                });
                Ok(out)
            }
            Dialect::MsSql => {
                if options.read_only {
                    return Err(PolyError::unsupported_operation(
                        *self,
                        "read-only transactions",
                    ));
                }
                let mut out = Vec::new();
                if let Some(level) = isolation {
                    out.push(format!("SET TRANSACTION ISOLATION LEVEL {level}"));
                }
                out.push("BEGIN TRANSACTION".to_string());
                Ok(out)
            }
            Dialect::Oracle => match (options.isolation, options.read_only) {
                (Some(_), true) => Err(PolyError::unsupported_operation(
                    *self,
                    "read-only transactions with an isolation level",
                )),
                (None, true) => Ok(vec!["SET TRANSACTION READ ONLY".to_string()]),
                (None, false) => Ok(vec!["SET TRANSACTION READ WRITE".to_string()]),
                (Some(level @ (IsolationLevel::ReadCommitted | IsolationLevel::Serializable)), false) => {
                    Ok(vec![format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql())])
                }
                (Some(level), false) => Err(PolyError::unsupported_operation(
                    *self,
                    format!("isolation level {}", level.as_sql()),
                )),
            },
        }
    }

    pub fn commit_sql(&self) -> &'static str {
        match self {
            Dialect::MsSql => "COMMIT TRANSACTION",
            _ => "COMMIT",
        }
    }

    pub fn rollback_sql(&self) -> &'static str {
        match self {
            Dialect::MsSql => "ROLLBACK TRANSACTION",
            _ => "ROLLBACK",
        }
    }

    pub fn savepoint_sql(&self, name: &str) -> String {
        match self {
            Dialect::MsSql => format!("SAVE TRANSACTION {name}"),
            _ => format!("SAVEPOINT {name}"),
        }
    }

    pub fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        match self {
            Dialect::MsSql => format!("ROLLBACK TRANSACTION {name}"),
            _ => format!("ROLLBACK TO SAVEPOINT {name}"),
        }
    }

    /// `None` when savepoints are released implicitly (MSSQL, Oracle).
    pub fn release_savepoint_sql(&self, name: &str) -> Option<String> {
        match self {
            Dialect::Postgres | Dialect::MySql => Some(format!("RELEASE SAVEPOINT {name}")),
            Dialect::MsSql | Dialect::Oracle => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = PolyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mysql2" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            "oracle" | "oracledb" => Ok(Dialect::Oracle),
            other => Err(PolyError::config(format!(
                "unknown client '{other}' (expected postgres, mysql, mssql or oracle)"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_client_names() {
        assert_eq!("pg".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("mssql".parse::<Dialect>().unwrap(), Dialect::MsSql);
        assert_eq!("oracledb".parse::<Dialect>().unwrap(), Dialect::Oracle);
        assert!("sqlite".parse::<Dialect>().is_err());
    }

    #[test]
    fn begin_with_isolation() {
        let opts = TransactionOptions::new().isolation_level(IsolationLevel::Serializable);
        assert_eq!(
            Dialect::Postgres.begin_statements(&opts).unwrap(),
            vec!["BEGIN ISOLATION LEVEL SERIALIZABLE"]
        );
        assert_eq!(
            Dialect::MySql.begin_statements(&opts).unwrap(),
            vec!["SET TRANSACTION ISOLATION LEVEL SERIALIZABLE", "START TRANSACTION"]
        );
        assert_eq!(
            Dialect::MsSql.begin_statements(&opts).unwrap(),
            vec!["SET TRANSACTION ISOLATION LEVEL SERIALIZABLE", "BEGIN TRANSACTION"]
        );
        assert_eq!(
            Dialect::Oracle.begin_statements(&opts).unwrap(),
            vec!["SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"]
        );
    }

    #[test]
    fn oracle_rejects_repeatable_read() {
        let opts = TransactionOptions::new().isolation_level(IsolationLevel::RepeatableRead);
        let err = Dialect::Oracle.begin_statements(&opts).unwrap_err();
        assert!(matches!(err, PolyError::UnsupportedOperation { .. }));
    }

    #[test]
    fn savepoint_syntax() {
        assert_eq!(Dialect::MsSql.savepoint_sql("sp_1"), "SAVE TRANSACTION sp_1");
        assert_eq!(
            Dialect::Postgres.rollback_to_savepoint_sql("sp_2"),
            "ROLLBACK TO SAVEPOINT sp_2"
        );
        assert_eq!(Dialect::Oracle.release_savepoint_sql("sp_1"), None);
    }
}
