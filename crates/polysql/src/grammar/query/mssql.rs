use super::{QueryGrammar, ReturningClause, common};
use crate::binder::{PlaceholderStyle, SqlFragment};
use crate::compiled::CompileWarning;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::statement::Statement;

/// ORDER BY used when OFFSET/FETCH is requested without an ordering.
const FALLBACK_ORDER: &str = "(SELECT NULL)";

pub struct MsSqlGrammar;

impl QueryGrammar for MsSqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtP
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn compile_select(
        &self,
        stmt: &Statement,
        warnings: &mut Vec<CompileWarning>,
    ) -> PolyResult<SqlFragment> {
        let mut out = common::select_core(self, stmt)?;
        let paginated = stmt.limit_value().is_some() || stmt.offset_value().is_some();
        if stmt.order_specs().is_empty() {
            if paginated {
                out.push(" ORDER BY ").push(FALLBACK_ORDER);
                warnings.push(CompileWarning::InjectedOrderBy {
                    fallback: FALLBACK_ORDER.to_string(),
                });
            }
        } else {
            out.push(&common::order_by(self, stmt.order_specs()));
        }
        out.push(&common::offset_fetch(stmt.limit_value(), stmt.offset_value()));
        Ok(out)
    }

    fn compile_returning(
        &self,
        _columns: &[String],
        _next_index: usize,
    ) -> PolyResult<ReturningClause> {
        Err(PolyError::unsupported_operation(Dialect::MsSql, "RETURNING"))
    }
}
