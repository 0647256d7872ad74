use super::{QueryGrammar, ReturningClause, common};
use crate::binder::{PlaceholderStyle, SqlFragment};
use crate::compiled::CompileWarning;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::statement::Statement;

/// Largest row count MySQL accepts; stands in for "no limit" when only OFFSET is set.
const MAX_ROWS: u64 = u64::MAX;

pub struct MySqlGrammar;

impl QueryGrammar for MySqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn compile_select(
        &self,
        stmt: &Statement,
        _warnings: &mut Vec<CompileWarning>,
    ) -> PolyResult<SqlFragment> {
        let mut out = common::select_core(self, stmt)?;
        out.push(&common::order_by(self, stmt.order_specs()));
        let limit = match (stmt.limit_value(), stmt.offset_value()) {
            (None, Some(_)) => Some(MAX_ROWS),
            (limit, _) => limit,
        };
        out.push(&common::limit_offset(limit, stmt.offset_value()));
        Ok(out)
    }

    fn compile_update(
        &self,
        stmt: &Statement,
        data: &crate::value::Record,
    ) -> PolyResult<SqlFragment> {
        let mut out = common::compile_update(self, stmt, data)?;
        out.push(&self.row_limit(stmt, "UPDATE")?);
        Ok(out)
    }

    fn compile_delete(&self, stmt: &Statement) -> PolyResult<SqlFragment> {
        let mut out = common::compile_delete(self, stmt)?;
        out.push(&self.row_limit(stmt, "DELETE")?);
        Ok(out)
    }

    fn compile_returning(
        &self,
        _columns: &[String],
        _next_index: usize,
    ) -> PolyResult<ReturningClause> {
        Err(PolyError::unsupported_operation(Dialect::MySql, "RETURNING"))
    }
}

impl MySqlGrammar {
    /// Single-table UPDATE/DELETE accept `ORDER BY ... LIMIT n` but no OFFSET.
    fn row_limit(&self, stmt: &Statement, op: &str) -> PolyResult<String> {
        if stmt.offset_value().is_some() {
            return Err(PolyError::unsupported_operation(
                Dialect::MySql,
                format!("OFFSET in {op}"),
            ));
        }
        let mut sql = String::new();
        if let Some(limit) = stmt.limit_value() {
            sql.push_str(&common::order_by(self, stmt.order_specs()));
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(sql)
    }
}
