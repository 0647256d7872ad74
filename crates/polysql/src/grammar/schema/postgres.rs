use super::SchemaGrammar;
use super::common::{check_decimal, check_length};
use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::PolyResult;
use crate::schema::{ColumnDefinition, ColumnType};
use crate::value::Value;

pub struct PostgresSchemaGrammar;

impl SchemaGrammar for PostgresSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn column_type(&self, column: &ColumnDefinition) -> PolyResult<String> {
        Ok(match column.column_type {
            ColumnType::Increments => "SERIAL".to_string(),
            ColumnType::BigIncrements => "BIGSERIAL".to_string(),
            ColumnType::String(len) => {
                check_length(self, len, 10_485_760)?;
                format!("VARCHAR({len})")
            }
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Decimal { precision, scale } => {
                check_decimal(self, precision, scale, 1000)?;
                format!("DECIMAL({precision},{scale})")
            }
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
            ColumnType::Json => "JSON".to_string(),
        })
    }

    fn compile_has_table(&self, table: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::Postgres,
            "SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = ?",
            vec![Value::from(table)],
        )
    }

    fn compile_has_column(&self, table: &str, column: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::Postgres,
            "SELECT 1 FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = ? AND column_name = ?",
            vec![Value::from(table), Value::from(column)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Blueprint, ForeignKey};

    #[test]
    fn create_table_with_constraints_and_index() {
        let mut bp = Blueprint::new("posts");
        bp.increments("id");
        bp.string("title", 200).not_nullable();
        bp.integer("user_id").not_nullable();
        bp.boolean("published").default_to(false);
        bp.foreign(
            ForeignKey::new(["user_id"])
                .references(["id"])
                .on("users")
                .on_delete("cascade"),
        );
        bp.index(["user_id"]);

        let sql = PostgresSchemaGrammar.compile_create_table(&bp).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"posts\" (\"id\" SERIAL NOT NULL PRIMARY KEY, \
                 \"title\" VARCHAR(200) NOT NULL, \"user_id\" INTEGER NOT NULL, \
                 \"published\" BOOLEAN DEFAULT FALSE, \
                 CONSTRAINT \"posts_user_id_foreign\" FOREIGN KEY (\"user_id\") \
                 REFERENCES \"users\" (\"id\") ON DELETE CASCADE)"
                    .to_string(),
                "CREATE INDEX \"posts_user_id_index\" ON \"posts\" (\"user_id\")".to_string(),
            ]
        );
    }

    #[test]
    fn alter_table_statements() {
        let mut bp = Blueprint::new("users");
        bp.string("nickname", 50);
        bp.rename_column("name", "full_name");
        bp.drop_column("legacy");
        let sql = PostgresSchemaGrammar.compile_alter_table(&bp).unwrap();
        assert_eq!(
            sql,
            vec![
                r#"ALTER TABLE "users" ADD COLUMN "nickname" VARCHAR(50)"#,
                r#"ALTER TABLE "users" RENAME COLUMN "name" TO "full_name""#,
                r#"ALTER TABLE "users" DROP COLUMN "legacy""#,
            ]
        );
    }

    #[test]
    fn drop_and_has_table() {
        assert_eq!(
            PostgresSchemaGrammar.compile_drop_table_if_exists("users"),
            r#"DROP TABLE IF EXISTS "users""#
        );
        let q = PostgresSchemaGrammar.compile_has_table("users").unwrap();
        assert!(q.sql.ends_with("table_name = $1"));
        assert_eq!(q.bindings, vec![Value::from("users")]);
    }

    #[test]
    fn rejects_bad_decimal() {
        let mut bp = Blueprint::new("prices");
        bp.decimal("amount", 4, 6);
        let err = PostgresSchemaGrammar.compile_create_table(&bp).unwrap_err();
        assert!(err.is_compile_error());
    }

    #[test]
    fn rejects_two_auto_increment_columns() {
        let mut bp = Blueprint::new("t");
        bp.increments("a");
        bp.big_increments("b");
        assert!(PostgresSchemaGrammar.compile_create_table(&bp).is_err());
    }
}
