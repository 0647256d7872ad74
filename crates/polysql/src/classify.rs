//! Driver error classification.
//!
//! Maps Postgres SQLSTATEs and vendor error numbers to a small, dialect
//! independent [`ErrorKind`]. Pure: no I/O and no retries.

use crate::connection::{DriverError, DriverPhase};
use crate::dialect::Dialect;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    UndefinedTable,
    UndefinedColumn,
    Syntax,
    Deadlock,
    SerializationFailure,
    Transaction,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::UniqueViolation => "unique violation",
            ErrorKind::ForeignKeyViolation => "foreign key violation",
            ErrorKind::NotNullViolation => "not null violation",
            ErrorKind::CheckViolation => "check violation",
            ErrorKind::UndefinedTable => "undefined table",
            ErrorKind::UndefinedColumn => "undefined column",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Deadlock => "deadlock",
            ErrorKind::SerializationFailure => "serialization failure",
            ErrorKind::Transaction => "transaction state",
            ErrorKind::Other => "other",
        }
    }

    /// Constraint violations caused by the data being written.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    /// Native code in its conventional spelling (`SQLSTATE 23505`, `ORA-00942`).
    pub sql_context: Option<String>,
    pub hint: Option<&'static str>,
}

/// Classify a driver error for `dialect`.
///
/// The driver phase wins over the code: connect failures are always
/// [`ErrorKind::Connection`] and control-statement failures are always
/// [`ErrorKind::Transaction`].
pub fn classify(dialect: Dialect, err: &DriverError) -> Classification {
    let (kind, sql_context) = match dialect {
        Dialect::Postgres => {
            let code = err.code.as_deref().unwrap_or("");
            (
                postgres_kind(code),
                err.code.as_ref().map(|c| format!("SQLSTATE {c}")),
            )
        }
        Dialect::MySql => {
            let number = err.code.as_deref().and_then(parse_number);
            (
                number.map_or(ErrorKind::Other, mysql_kind),
                number.map(|n| format!("MySQL error {n}")),
            )
        }
        Dialect::MsSql => {
            let number = err.code.as_deref().and_then(parse_number);
            (
                number.map_or(ErrorKind::Other, |n| mssql_kind(n, &err.message)),
                number.map(|n| format!("MSSQL error {n}")),
            )
        }
        Dialect::Oracle => {
            let number = err
                .code
                .as_deref()
                .and_then(parse_ora)
                .or_else(|| ora_from_message(&err.message));
            (
                number.map_or(ErrorKind::Other, oracle_kind),
                number.map(|n| format!("ORA-{n:05}")),
            )
        }
    };
    let kind = match err.phase {
        DriverPhase::Connect => ErrorKind::Connection,
        DriverPhase::Control => ErrorKind::Transaction,
        DriverPhase::Execute => kind,
    };
    Classification {
        kind,
        sql_context,
        hint: hint(kind),
    }
}

fn hint(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::UndefinedTable => Some("check the table name or run pending migrations"),
        ErrorKind::Deadlock | ErrorKind::SerializationFailure => {
            Some("the transaction was aborted by the server and may be retried by the caller")
        }
        ErrorKind::Connection => Some("check the connection settings and that the server is reachable"),
        _ => None,
    }
}

fn parse_number(code: &str) -> Option<i64> {
    code.trim().parse().ok()
}

fn parse_ora(code: &str) -> Option<i64> {
    let code = code.trim();
    let digits = code
        .strip_prefix("ORA-")
        .or_else(|| code.strip_prefix("ora-"))
        .unwrap_or(code);
    digits.parse::<i64>().ok().map(i64::abs)
}

fn ora_from_message(message: &str) -> Option<i64> {
    let start = message.find("ORA-")? + 4;
    let digits: String = message[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn postgres_kind(sqlstate: &str) -> ErrorKind {
    match sqlstate {
        "23505" => ErrorKind::UniqueViolation,
        "23503" => ErrorKind::ForeignKeyViolation,
        "23502" => ErrorKind::NotNullViolation,
        "23514" => ErrorKind::CheckViolation,
        "42P01" => ErrorKind::UndefinedTable,
        "42703" => ErrorKind::UndefinedColumn,
        "42601" => ErrorKind::Syntax,
        "40P01" => ErrorKind::Deadlock,
        "40001" => ErrorKind::SerializationFailure,
        "57P01" | "57P02" | "57P03" => ErrorKind::Connection,
        "2D000" => ErrorKind::Transaction,
        s if s.starts_with("08") => ErrorKind::Connection,
        s if s.starts_with("25") || s.starts_with("3B") => ErrorKind::Transaction,
        _ => ErrorKind::Other,
    }
}

fn mysql_kind(number: i64) -> ErrorKind {
    match number {
        1062 | 1586 => ErrorKind::UniqueViolation,
        1216 | 1217 | 1451 | 1452 => ErrorKind::ForeignKeyViolation,
        1048 | 1364 => ErrorKind::NotNullViolation,
        3819 => ErrorKind::CheckViolation,
        1146 => ErrorKind::UndefinedTable,
        1054 => ErrorKind::UndefinedColumn,
        1064 => ErrorKind::Syntax,
        1213 => ErrorKind::Deadlock,
        1305 | 1399 | 1400 | 1568 => ErrorKind::Transaction,
        1040 | 1045 | 2002 | 2003 | 2006 | 2013 => ErrorKind::Connection,
        _ => ErrorKind::Other,
    }
}

fn mssql_kind(number: i64, message: &str) -> ErrorKind {
    match number {
        2601 | 2627 => ErrorKind::UniqueViolation,
        // 547 covers both FOREIGN KEY and CHECK conflicts.
        547 if message.contains("CHECK") => ErrorKind::CheckViolation,
        547 => ErrorKind::ForeignKeyViolation,
        515 => ErrorKind::NotNullViolation,
        208 => ErrorKind::UndefinedTable,
        207 => ErrorKind::UndefinedColumn,
        102 | 156 => ErrorKind::Syntax,
        1205 => ErrorKind::Deadlock,
        3960 => ErrorKind::SerializationFailure,
        3902 | 3903 | 3908 | 6401 => ErrorKind::Transaction,
        53 | 4060 | 10054 | 18456 => ErrorKind::Connection,
        _ => ErrorKind::Other,
    }
}

fn oracle_kind(number: i64) -> ErrorKind {
    match number {
        1 => ErrorKind::UniqueViolation,
        2291 | 2292 => ErrorKind::ForeignKeyViolation,
        1400 | 1407 => ErrorKind::NotNullViolation,
        2290 => ErrorKind::CheckViolation,
        942 => ErrorKind::UndefinedTable,
        904 => ErrorKind::UndefinedColumn,
        900 | 907 | 923 | 933 | 936 => ErrorKind::Syntax,
        60 => ErrorKind::Deadlock,
        8177 => ErrorKind::SerializationFailure,
        1086 => ErrorKind::Transaction,
        1017 | 3113 | 3114 | 12154 | 12514 | 12541 => ErrorKind::Connection,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(dialect: Dialect, code: &str) -> ErrorKind {
        classify(dialect, &DriverError::execute("boom").with_code(code)).kind
    }

    #[test]
    fn unique_violation_in_every_dialect() {
        assert_eq!(kind(Dialect::Postgres, "23505"), ErrorKind::UniqueViolation);
        assert_eq!(kind(Dialect::MySql, "1062"), ErrorKind::UniqueViolation);
        assert_eq!(kind(Dialect::MsSql, "2627"), ErrorKind::UniqueViolation);
        assert_eq!(kind(Dialect::Oracle, "ORA-00001"), ErrorKind::UniqueViolation);
        assert_eq!(kind(Dialect::Oracle, "1"), ErrorKind::UniqueViolation);
    }

    #[test]
    fn postgres_classes() {
        assert_eq!(kind(Dialect::Postgres, "08006"), ErrorKind::Connection);
        assert_eq!(kind(Dialect::Postgres, "25P02"), ErrorKind::Transaction);
        assert_eq!(kind(Dialect::Postgres, "3B001"), ErrorKind::Transaction);
        assert_eq!(kind(Dialect::Postgres, "22012"), ErrorKind::Other);
    }

    #[test]
    fn mssql_547_splits_on_message() {
        let check = DriverError::execute("The INSERT statement conflicted with the CHECK constraint")
            .with_code("547");
        assert_eq!(classify(Dialect::MsSql, &check).kind, ErrorKind::CheckViolation);
        let fk = DriverError::execute("conflicted with the FOREIGN KEY constraint").with_code("547");
        assert_eq!(classify(Dialect::MsSql, &fk).kind, ErrorKind::ForeignKeyViolation);
    }

    #[test]
    fn oracle_code_from_message() {
        let err = DriverError::execute("ORA-00942: table or view does not exist");
        let c = classify(Dialect::Oracle, &err);
        assert_eq!(c.kind, ErrorKind::UndefinedTable);
        assert_eq!(c.sql_context.as_deref(), Some("ORA-00942"));
        assert!(c.hint.is_some());
    }

    #[test]
    fn phase_overrides_code() {
        let err = DriverError::control("cannot commit").with_code("23505");
        assert_eq!(classify(Dialect::Postgres, &err).kind, ErrorKind::Transaction);
        let err = DriverError::connect("refused").with_code("1064");
        assert_eq!(classify(Dialect::MySql, &err).kind, ErrorKind::Connection);
    }

    #[test]
    fn missing_code_is_other() {
        let c = classify(Dialect::MySql, &DriverError::execute("?"));
        assert_eq!(c.kind, ErrorKind::Other);
        assert_eq!(c.sql_context, None);
    }
}
