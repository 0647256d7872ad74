//! Final, dialect-native statements ready for a driver.

use crate::binder::{count_placeholders, rewrite_placeholders};
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::value::Value;
use std::fmt;

/// An output parameter (Oracle `RETURNING ... INTO :n`).
///
/// Drivers bind one output variable per entry and report the captured values
/// as a single result row whose columns are the `column` names, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutParam {
    /// 1-based placeholder index, continuing after the input bindings.
    pub index: usize,
    pub column: String,
}

/// Non-fatal notes produced while compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// Pagination needed an ORDER BY and a deterministic fallback was injected.
    InjectedOrderBy { fallback: String },
    /// Pagination without ORDER BY; row order is not deterministic.
    UnorderedPagination,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::InjectedOrderBy { fallback } => write!(
                f,
                "pagination requires ORDER BY; injected `ORDER BY {fallback}`"
            ),
            CompileWarning::UnorderedPagination => {
                f.write_str("pagination without ORDER BY returns rows in no guaranteed order")
            }
        }
    }
}

/// A compiled statement: native SQL text plus positional bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub dialect: Dialect,
    pub sql: String,
    pub bindings: Vec<Value>,
    pub out_params: Vec<OutParam>,
    pub warnings: Vec<CompileWarning>,
}

impl CompiledQuery {
    /// Compile caller-written SQL using canonical `?` markers.
    ///
    /// The number of markers must equal the number of bindings.
    pub fn raw(dialect: Dialect, sql: &str, bindings: Vec<Value>) -> PolyResult<Self> {
        let style = dialect.query_grammar().placeholder_style();
        let markers = count_placeholders(sql, style);
        if markers != bindings.len() {
            return Err(PolyError::validation(format!(
                "expected {markers} bindings for {markers} placeholders, got {}",
                bindings.len()
            )));
        }
        Ok(Self {
            dialect,
            sql: rewrite_placeholders(sql, style),
            bindings,
            out_params: Vec::new(),
            warnings: Vec::new(),
        })
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rewrites_for_dialect() {
        let q = CompiledQuery::raw(
            Dialect::MsSql,
            "SELECT * FROM t WHERE a = ? AND b = ?",
            vec![Value::Int(1), Value::Int(2)],
        )
        .unwrap();
        assert_eq!(q.sql, "SELECT * FROM t WHERE a = @p1 AND b = @p2");
    }

    #[test]
    fn raw_rejects_binding_mismatch() {
        let err = CompiledQuery::raw(Dialect::Postgres, "SELECT ?", vec![]).unwrap_err();
        assert!(err.is_compile_error());
    }
}
