use super::SchemaGrammar;
use super::common::{check_decimal, check_length};
use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::schema::{ColumnDefinition, ColumnType};
use crate::value::Value;

pub struct MySqlSchemaGrammar;

impl SchemaGrammar for MySqlSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn column_type(&self, column: &ColumnDefinition) -> PolyResult<String> {
        Ok(match column.column_type {
            ColumnType::Increments => "INT UNSIGNED".to_string(),
            ColumnType::BigIncrements => "BIGINT UNSIGNED".to_string(),
            ColumnType::String(len) => {
                check_length(self, len, 65_535)?;
                format!("VARCHAR({len})")
            }
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Decimal { precision, scale } => {
                check_decimal(self, precision, scale, 65)?;
                format!("DECIMAL({precision},{scale})")
            }
            ColumnType::Timestamp => "DATETIME".to_string(),
            ColumnType::TimestampTz => {
                return Err(PolyError::unsupported_type(
                    Dialect::MySql,
                    "timestampTz",
                    "MySQL has no time-zone aware timestamp type",
                ));
            }
            ColumnType::Json => "JSON".to_string(),
        })
    }

    fn auto_increment_modifier(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn compile_drop_index(&self, table: &str, name: &str) -> String {
        format!("DROP INDEX {} ON {}", self.wrap(name), self.wrap(table))
    }

    fn compile_drop_foreign(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.wrap(table),
            self.wrap(name)
        )
    }

    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!("RENAME TABLE {} TO {}", self.wrap(from), self.wrap(to))
    }

    fn compile_has_table(&self, table: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::MySql,
            "SELECT 1 FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
            vec![Value::from(table)],
        )
    }

    fn compile_has_column(&self, table: &str, column: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::MySql,
            "SELECT 1 FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?",
            vec![Value::from(table), Value::from(column)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Blueprint;

    #[test]
    fn increments_use_auto_increment() {
        let mut bp = Blueprint::new("users");
        bp.increments("id");
        bp.string("email", 255).unique();
        let sql = MySqlSchemaGrammar.compile_create_table(&bp).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE `users` (`id` INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                 `email` VARCHAR(255) UNIQUE)"
            ]
        );
    }

    #[test]
    fn timestamp_tz_is_unsupported() {
        let mut bp = Blueprint::new("events");
        bp.timestamp_tz("at");
        let err = MySqlSchemaGrammar.compile_create_table(&bp).unwrap_err();
        assert!(matches!(err, PolyError::UnsupportedType { .. }));
    }

    #[test]
    fn string_length_limit() {
        let mut bp = Blueprint::new("t");
        bp.string("s", 70_000);
        assert!(MySqlSchemaGrammar.compile_create_table(&bp).is_err());
    }

    #[test]
    fn drop_index_and_foreign_name_the_table() {
        let mut bp = Blueprint::new("posts");
        bp.drop_index("posts_user_id_index");
        bp.drop_foreign("posts_user_id_foreign");
        assert_eq!(
            MySqlSchemaGrammar.compile_alter_table(&bp).unwrap(),
            vec![
                "DROP INDEX `posts_user_id_index` ON `posts`",
                "ALTER TABLE `posts` DROP FOREIGN KEY `posts_user_id_foreign`",
            ]
        );
    }
}
