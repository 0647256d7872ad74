use super::SchemaGrammar;
use super::common::{check_decimal, check_length, quote_string};
use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::PolyResult;
use crate::schema::{ColumnDefinition, ColumnType};
use crate::value::Value;

pub struct MsSqlSchemaGrammar;

impl SchemaGrammar for MsSqlSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    fn column_type(&self, column: &ColumnDefinition) -> PolyResult<String> {
        Ok(match column.column_type {
            ColumnType::Increments => "INT IDENTITY(1,1)".to_string(),
            ColumnType::BigIncrements => "BIGINT IDENTITY(1,1)".to_string(),
            ColumnType::String(len) => {
                check_length(self, len, 4000)?;
                format!("NVARCHAR({len})")
            }
            ColumnType::Text | ColumnType::Json => "NVARCHAR(MAX)".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean => "BIT".to_string(),
            ColumnType::Decimal { precision, scale } => {
                check_decimal(self, precision, scale, 38)?;
                format!("DECIMAL({precision},{scale})")
            }
            ColumnType::Timestamp => "DATETIME2".to_string(),
            ColumnType::TimestampTz => "DATETIMEOFFSET".to_string(),
        })
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn compile_add_column(&self, table: &str, column: &ColumnDefinition) -> PolyResult<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD {}",
            self.wrap(table),
            self.compile_column(column)?
        )])
    }

    fn compile_rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "EXEC sp_rename N{}, N{}, N'COLUMN'",
            quote_string(&format!("{table}.{from}")),
            quote_string(to)
        )
    }

    fn compile_drop_index(&self, table: &str, name: &str) -> String {
        format!("DROP INDEX {} ON {}", self.wrap(name), self.wrap(table))
    }

    fn compile_drop_table_if_exists(&self, table: &str) -> String {
        format!(
            "IF OBJECT_ID(N{}, N'U') IS NOT NULL DROP TABLE {}",
            quote_string(table),
            self.wrap(table)
        )
    }

    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "EXEC sp_rename N{}, N{}",
            quote_string(from),
            quote_string(to)
        )
    }

    fn compile_has_table(&self, table: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::MsSql,
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = ?",
            vec![Value::from(table)],
        )
    }

    fn compile_has_column(&self, table: &str, column: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::MsSql,
            "SELECT 1 FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = ? AND COLUMN_NAME = ?",
            vec![Value::from(table), Value::from(column)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Blueprint;

    #[test]
    fn identity_and_type_map() {
        let mut bp = Blueprint::new("users");
        bp.increments("id");
        bp.text("bio");
        bp.boolean("active").default_to(true);
        bp.timestamp_tz("seen_at");
        let sql = MsSqlSchemaGrammar.compile_create_table(&bp).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE [users] ([id] INT IDENTITY(1,1) NOT NULL PRIMARY KEY, \
                 [bio] NVARCHAR(MAX), [active] BIT DEFAULT 1, [seen_at] DATETIMEOFFSET)"
            ]
        );
    }

    #[test]
    fn drop_if_exists_uses_object_id() {
        assert_eq!(
            MsSqlSchemaGrammar.compile_drop_table_if_exists("users"),
            "IF OBJECT_ID(N'users', N'U') IS NOT NULL DROP TABLE [users]"
        );
    }

    #[test]
    fn rename_column_uses_sp_rename() {
        let mut bp = Blueprint::new("users");
        bp.rename_column("name", "full_name");
        assert_eq!(
            MsSqlSchemaGrammar.compile_alter_table(&bp).unwrap(),
            vec!["EXEC sp_rename N'users.name', N'full_name', N'COLUMN'"]
        );
    }

    #[test]
    fn nvarchar_limit() {
        let mut bp = Blueprint::new("t");
        bp.string("s", 4001);
        assert!(MsSqlSchemaGrammar.compile_create_table(&bp).is_err());
    }
}
