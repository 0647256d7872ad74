use super::{QueryGrammar, ReturningClause, common};
use crate::binder::{PlaceholderStyle, SqlFragment};
use crate::compiled::{CompileWarning, OutParam};
use crate::dialect::Dialect;
use crate::error::PolyResult;
use crate::statement::Statement;
use crate::value::Record;

pub struct OracleGrammar;

impl QueryGrammar for OracleGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Colon
    }

    /// Oracle folds unquoted names to upper case; quoting the upper-cased
    /// name keeps tables created unquoted reachable.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.to_uppercase().replace('"', "\"\""))
    }

    fn compile_select(
        &self,
        stmt: &Statement,
        warnings: &mut Vec<CompileWarning>,
    ) -> PolyResult<SqlFragment> {
        let mut out = common::select_core(self, stmt)?;
        let paginated = stmt.limit_value().is_some() || stmt.offset_value().is_some();
        if paginated && stmt.order_specs().is_empty() {
            warnings.push(CompileWarning::UnorderedPagination);
        }
        out.push(&common::order_by(self, stmt.order_specs()));
        out.push(&common::offset_fetch(stmt.limit_value(), stmt.offset_value()));
        Ok(out)
    }

    fn compile_insert(&self, table: &str, rows: &[Record]) -> PolyResult<SqlFragment> {
        if rows.len() > 1 {
            common::compile_insert_all(self, table, rows)
        } else {
            common::compile_insert_values(self, table, rows)
        }
    }

    fn compile_returning(
        &self,
        columns: &[String],
        next_index: usize,
    ) -> PolyResult<ReturningClause> {
        let out_params: Vec<OutParam> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| OutParam {
                index: next_index + i,
                column: column.clone(),
            })
            .collect();
        let targets = out_params
            .iter()
            .map(|p| self.placeholder_style().render(p.index))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(ReturningClause {
            sql: format!(
                " RETURNING {} INTO {targets}",
                common::columnize(self, columns)
            ),
            out_params,
        })
    }
}
