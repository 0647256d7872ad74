use super::{QueryGrammar, ReturningClause, common};
use crate::binder::{PlaceholderStyle, SqlFragment};
use crate::compiled::CompileWarning;
use crate::dialect::Dialect;
use crate::error::PolyResult;
use crate::statement::{Operator, Statement};

pub struct PostgresGrammar;

impl QueryGrammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn operator_sql(&self, operator: Operator) -> PolyResult<&'static str> {
        Ok(operator.as_sql())
    }

    fn compile_select(
        &self,
        stmt: &Statement,
        _warnings: &mut Vec<CompileWarning>,
    ) -> PolyResult<SqlFragment> {
        let mut out = common::select_core(self, stmt)?;
        out.push(&common::order_by(self, stmt.order_specs()));
        out.push(&common::limit_offset(stmt.limit_value(), stmt.offset_value()));
        Ok(out)
    }

    fn compile_returning(
        &self,
        columns: &[String],
        _next_index: usize,
    ) -> PolyResult<ReturningClause> {
        Ok(ReturningClause {
            sql: format!(" RETURNING {}", common::columnize(self, columns)),
            out_params: Vec::new(),
        })
    }

    fn supports_multi_row_returning(&self) -> bool {
        true
    }
}
