//! Schema grammars: DDL compilation from a [`Blueprint`].

pub mod common;
mod mssql;
mod mysql;
mod oracle;
mod postgres;

pub use mssql::MsSqlSchemaGrammar;
pub use mysql::MySqlSchemaGrammar;
pub use oracle::{OracleSchemaGrammar, oracle_identifier};
pub use postgres::PostgresSchemaGrammar;

use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::PolyResult;
use crate::schema::{Blueprint, ColumnDefinition, ForeignKey};

/// Dialect-specific DDL compilation.
///
/// Statements are returned in execution order and run one at a time.
pub trait SchemaGrammar: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn wrap(&self, ident: &str) -> String {
        self.dialect().query_grammar().wrap(ident)
    }

    /// Native type for a column, or `UnsupportedType`.
    fn column_type(&self, column: &ColumnDefinition) -> PolyResult<String>;

    /// Keyword placed after `NOT NULL` on auto-increment columns.
    fn auto_increment_modifier(&self) -> Option<&'static str> {
        None
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    /// Fit a generated object name into the dialect's identifier limit.
    fn short_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn compile_column(&self, column: &ColumnDefinition) -> PolyResult<String> {
        common::column(self, column)
    }

    fn compile_foreign(&self, table: &str, foreign: &ForeignKey) -> PolyResult<String> {
        common::foreign_constraint(self, table, foreign)
    }

    fn compile_create_table(&self, blueprint: &Blueprint) -> PolyResult<Vec<String>> {
        common::create_table(self, blueprint)
    }

    fn compile_alter_table(&self, blueprint: &Blueprint) -> PolyResult<Vec<String>> {
        common::alter_table(self, blueprint)
    }

    fn compile_add_column(&self, table: &str, column: &ColumnDefinition) -> PolyResult<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.wrap(table),
            self.compile_column(column)?
        )])
    }

    fn compile_rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.wrap(table),
            self.wrap(from),
            self.wrap(to)
        )
    }

    fn compile_drop_index(&self, _table: &str, name: &str) -> String {
        format!("DROP INDEX {}", self.wrap(name))
    }

    fn compile_drop_foreign(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.wrap(table),
            self.wrap(name)
        )
    }

    fn compile_drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.wrap(table))
    }

    fn compile_drop_table_if_exists(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.wrap(table))
    }

    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.wrap(from), self.wrap(to))
    }

    /// SELECT returning at least one row when `table` exists.
    fn compile_has_table(&self, table: &str) -> PolyResult<CompiledQuery>;

    /// SELECT returning at least one row when `table.column` exists.
    fn compile_has_column(&self, table: &str, column: &str) -> PolyResult<CompiledQuery>;
}
