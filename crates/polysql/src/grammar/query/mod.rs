//! Query grammars: SELECT / INSERT / UPDATE / DELETE compilation.

pub mod common;
mod mssql;
mod mysql;
mod oracle;
mod postgres;

pub use mssql::MsSqlGrammar;
pub use mysql::MySqlGrammar;
pub use oracle::OracleGrammar;
pub use postgres::PostgresGrammar;

use crate::binder::{PlaceholderStyle, SqlFragment};
use crate::compiled::{CompileWarning, OutParam};
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::statement::{Operator, Statement};
use crate::value::Record;

/// Compiled RETURNING clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturningClause {
    /// Text appended after the statement, with a leading space.
    pub sql: String,
    /// Output parameters (Oracle only).
    pub out_params: Vec<OutParam>,
}

/// Dialect-specific DML compilation.
///
/// Compile methods emit canonical `?` markers; [`QueryGrammar::rewrite_placeholders`]
/// turns them into the native syntax afterwards.
pub trait QueryGrammar: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Quote a single identifier part.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a possibly dotted / aliased identifier (`users.id`, `name as n`, `t.*`).
    fn wrap(&self, value: &str) -> String {
        common::wrap(self, value)
    }

    fn operator_sql(&self, operator: Operator) -> PolyResult<&'static str> {
        match operator {
            Operator::ILike => Err(PolyError::unsupported_operation(
                self.dialect(),
                "ILIKE (use LIKE with LOWER())",
            )),
            op => Ok(op.as_sql()),
        }
    }

    fn compile_select(
        &self,
        stmt: &Statement,
        warnings: &mut Vec<CompileWarning>,
    ) -> PolyResult<SqlFragment>;

    /// Insert column list for `rows`: union of keys in first-seen order.
    fn insert_columns(&self, rows: &[Record]) -> Vec<String> {
        common::insert_columns(rows)
    }

    fn compile_insert(&self, table: &str, rows: &[Record]) -> PolyResult<SqlFragment> {
        common::compile_insert_values(self, table, rows)
    }

    fn compile_update(&self, stmt: &Statement, data: &Record) -> PolyResult<SqlFragment> {
        common::reject_pagination(self, stmt, "UPDATE")?;
        common::compile_update(self, stmt, data)
    }

    fn compile_delete(&self, stmt: &Statement) -> PolyResult<SqlFragment> {
        common::reject_pagination(self, stmt, "DELETE")?;
        common::compile_delete(self, stmt)
    }

    /// RETURNING clause; `next_index` is the first free 1-based placeholder index.
    fn compile_returning(&self, columns: &[String], next_index: usize)
    -> PolyResult<ReturningClause>;

    fn supports_multi_row_returning(&self) -> bool {
        false
    }

    fn rewrite_placeholders(&self, sql: &str) -> String {
        crate::binder::rewrite_placeholders(sql, self.placeholder_style())
    }
}

#[cfg(test)]
mod tests {
    use crate::dialect::Dialect;
    use crate::statement::{Direction, Statement};
    use crate::value::{Record, Value};
    use crate::compiled::CompileWarning;

    fn users() -> Statement {
        Statement::table("users")
            .select(["id", "name"])
            .where_eq("id", 7)
    }

    #[test]
    fn same_statement_every_dialect() {
        let expected = [
            (Dialect::Postgres, r#"SELECT "id", "name" FROM "users" WHERE "id" = $1"#),
            (Dialect::MySql, "SELECT `id`, `name` FROM `users` WHERE `id` = ?"),
            (Dialect::MsSql, "SELECT [id], [name] FROM [users] WHERE [id] = @p1"),
            (Dialect::Oracle, r#"SELECT "ID", "NAME" FROM "USERS" WHERE "ID" = :1"#),
        ];
        for (dialect, sql) in expected {
            let q = users().to_query(dialect).unwrap();
            assert_eq!(q.sql, sql, "{dialect}");
            assert_eq!(q.bindings, vec![Value::Int(7)]);
            assert!(q.warnings.is_empty());
        }
    }

    #[test]
    fn clause_order_and_binding_order() {
        let stmt = Statement::table("orders")
            .select(["customer_id"])
            .select_raw("SUM(total) AS total")
            .join("customers", "customers.id", "=", "orders.customer_id")
            .where_op("orders.status", "!=", "void")
            .where_in("orders.region", ["eu", "us"])
            .group_by(["customer_id"])
            .having_raw("SUM(total) > ?", vec![Value::Int(100)])
            .order_by("customer_id", Direction::Asc)
            .limit(10)
            .offset(20);
        let q = stmt.to_query(Dialect::Postgres).unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"customer_id\", SUM(total) AS total FROM \"orders\" \
             INNER JOIN \"customers\" ON \"customers\".\"id\" = \"orders\".\"customer_id\" \
             WHERE \"orders\".\"status\" <> $1 AND \"orders\".\"region\" IN ($2, $3) \
             GROUP BY \"customer_id\" HAVING (SUM(total) > $4) \
             ORDER BY \"customer_id\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            q.bindings,
            vec![
                Value::from("void"),
                Value::from("eu"),
                Value::from("us"),
                Value::Int(100)
            ]
        );
    }

    #[test]
    fn mssql_pagination_injects_order_by() {
        let q = Statement::table("users")
            .limit(10)
            .offset(5)
            .to_query(Dialect::MsSql)
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM [users] ORDER BY (SELECT NULL) OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert!(matches!(
            q.warnings.as_slice(),
            [CompileWarning::InjectedOrderBy { .. }]
        ));
    }

    #[test]
    fn mssql_pagination_with_order_is_untouched() {
        let q = Statement::table("users")
            .order_by_desc("id")
            .limit(10)
            .to_query(Dialect::MsSql)
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM [users] ORDER BY [id] DESC OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert!(q.warnings.is_empty());
    }

    #[test]
    fn oracle_pagination_warns_without_injecting() {
        let q = Statement::table("users")
            .limit(10)
            .to_query(Dialect::Oracle)
            .unwrap();
        assert_eq!(
            q.sql,
            r#"SELECT * FROM "USERS" OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"#
        );
        assert_eq!(q.warnings, vec![CompileWarning::UnorderedPagination]);
    }

    #[test]
    fn mysql_offset_without_limit() {
        let q = Statement::table("users")
            .offset(30)
            .to_query(Dialect::MySql)
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM `users` LIMIT 18446744073709551615 OFFSET 30"
        );
    }

    #[test]
    fn multi_row_insert_unions_columns() {
        let rows = [
            Record::new().set("name", "ann").set("age", 30),
            Record::new().set("name", "bob").set("email", "b@x.io"),
        ];
        let q = Statement::table("users")
            .to_insert_query(Dialect::Postgres, &rows)
            .unwrap();
        assert_eq!(
            q.sql,
            r#"INSERT INTO "users" ("name", "age", "email") VALUES ($1, $2, $3), ($4, $5, $6)"#
        );
        assert_eq!(
            q.bindings,
            vec![
                Value::from("ann"),
                Value::Int(30),
                Value::Null,
                Value::from("bob"),
                Value::Null,
                Value::from("b@x.io"),
            ]
        );
    }

    #[test]
    fn oracle_multi_row_insert_uses_insert_all() {
        let rows = [Record::new().set("a", 1), Record::new().set("a", 2)];
        let q = Statement::table("t")
            .to_insert_query(Dialect::Oracle, &rows)
            .unwrap();
        assert_eq!(
            q.sql,
            r#"INSERT ALL INTO "T" ("A") VALUES (:1) INTO "T" ("A") VALUES (:2) SELECT 1 FROM DUAL"#
        );
    }

    #[test]
    fn empty_insert_and_update_are_rejected() {
        let stmt = Statement::table("users");
        assert!(stmt.to_insert_query(Dialect::MySql, &[]).unwrap_err().is_compile_error());
        assert!(
            stmt.to_insert_query(Dialect::MySql, &[Record::new()])
                .unwrap_err()
                .is_compile_error()
        );
        assert!(
            stmt.to_update_query(Dialect::MySql, &Record::new())
                .unwrap_err()
                .is_compile_error()
        );
    }

    #[test]
    fn update_binds_data_before_predicates() {
        let q = Statement::table("users")
            .where_eq("id", 3)
            .to_update_query(Dialect::MsSql, &Record::new().set("name", "x"))
            .unwrap();
        assert_eq!(q.sql, "UPDATE [users] SET [name] = @p1 WHERE [id] = @p2");
        assert_eq!(q.bindings, vec![Value::from("x"), Value::Int(3)]);
    }

    #[test]
    fn postgres_returning() {
        let q = Statement::table("users")
            .returning(["id"])
            .to_insert_query(Dialect::Postgres, &[Record::new().set("name", "ann")])
            .unwrap();
        assert_eq!(
            q.sql,
            r#"INSERT INTO "users" ("name") VALUES ($1) RETURNING "id""#
        );
        assert!(q.out_params.is_empty());
    }

    #[test]
    fn oracle_returning_into_out_params() {
        let q = Statement::table("users")
            .where_eq("id", 1)
            .returning(["id", "name"])
            .to_delete_query(Dialect::Oracle)
            .unwrap();
        assert_eq!(
            q.sql,
            r#"DELETE FROM "USERS" WHERE "ID" = :1 RETURNING "ID", "NAME" INTO :2, :3"#
        );
        assert_eq!(q.out_params.len(), 2);
        assert_eq!(q.out_params[0].index, 2);
        assert_eq!(q.out_params[1].column, "name");
    }

    #[test]
    fn returning_unsupported_on_mysql_and_mssql() {
        for dialect in [Dialect::MySql, Dialect::MsSql] {
            let err = Statement::table("users")
                .returning(["id"])
                .to_delete_query(dialect)
                .unwrap_err();
            assert!(err.is_compile_error());
        }
    }

    #[test]
    fn ilike_is_postgres_only() {
        let stmt = Statement::table("users").where_op("name", "ilike", "a%");
        assert!(stmt.to_query(Dialect::Postgres).is_ok());
        assert!(stmt.to_query(Dialect::MySql).is_err());
    }

    #[test]
    fn raw_predicate_binding_count_is_checked() {
        let stmt = Statement::table("users").where_raw("id IN (SELECT user_id FROM bans WHERE at > ?)", vec![]);
        assert!(stmt.to_query(Dialect::Postgres).is_err());
    }

    #[test]
    fn aggregate_with_alias() {
        let q = Statement::table("orders")
            .select_sum("total")
            .aggregate_as("revenue")
            .where_null("deleted_at")
            .to_query(Dialect::MySql)
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT SUM(`total`) AS `revenue` FROM `orders` WHERE `deleted_at` IS NULL"
        );
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let q = Statement::table("users")
            .where_in("id", Vec::<i64>::new())
            .to_query(Dialect::Postgres)
            .unwrap();
        assert_eq!(q.sql, r#"SELECT * FROM "users" WHERE 1 = 0"#);
    }

    #[test]
    fn pagination_on_delete_is_rejected_except_mysql_limit() {
        let stmt = Statement::table("logs").limit(100);
        assert!(stmt.to_delete_query(Dialect::Postgres).is_err());
        let q = stmt.to_delete_query(Dialect::MySql).unwrap();
        assert_eq!(q.sql, "DELETE FROM `logs` LIMIT 100");
    }
}
