//! The statement model and its fluent builder.
//!
//! A [`Statement`] describes a pending SELECT/INSERT/UPDATE/DELETE against
//! one table. It is filled through consuming builder methods, compiled for a
//! [`Dialect`] by the matching query grammar, and executed through any
//! [`Executor`] (a [`Database`](crate::Database) or a
//! [`Transaction`](crate::Transaction)).
//!
//! ```ignore
//! use polysql::{Statement, Record};
//!
//! let rows = Statement::table("users")
//!     .select(["id", "name"])
//!     .where_eq("status", "active")
//!     .order_by("id", Direction::Asc)
//!     .limit(10)
//!     .get(&mut db)
//!     .await?;
//!
//! Statement::table("users")
//!     .insert(&mut tx, &[Record::new().set("name", "ann")])
//!     .await?;
//! ```

use crate::compiled::{CompileWarning, CompiledQuery};
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::executor::Executor;
use crate::value::{Record, Row, Value};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a predicate or join condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    /// Case-insensitive LIKE (Postgres only).
    ILike,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::ILike => "ILIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = PolyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "like" => Ok(Operator::Like),
            "not like" => Ok(Operator::NotLike),
            "ilike" => Ok(Operator::ILike),
            other => Err(PolyError::validation(format!("unknown operator '{other}'"))),
        }
    }
}

/// A WHERE / HAVING predicate. Predicates are always AND-combined.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op ?`
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
    /// `column [NOT] IN (?, ...)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column IS [NOT] NULL`
    Null { column: String, negated: bool },
    /// Caller-written fragment (e.g. a subquery) with canonical `?` markers.
    Raw { sql: String, bindings: Vec<Value> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub left_column: String,
    pub operator: Operator,
    pub right_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = PolyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(PolyError::validation(format!("unknown order direction '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFn,
    pub column: String,
    pub alias: Option<String>,
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    /// Identifier, optionally dotted and/or aliased with `as`; quoted per dialect.
    Column(String),
    /// Expression emitted verbatim.
    Raw(String),
}

/// In-memory description of a pending query against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub(crate) table: String,
    pub(crate) distinct: bool,
    pub(crate) columns: Vec<SelectItem>,
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) joins: Vec<Join>,
    pub(crate) wheres: Vec<Predicate>,
    pub(crate) groups: Vec<String>,
    pub(crate) havings: Vec<Predicate>,
    pub(crate) orders: Vec<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) returning: Vec<String>,
    /// First builder error; reported when the statement is compiled.
    build_error: Option<String>,
}

impl Statement {
    /// Start a statement against `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            distinct: false,
            columns: Vec::new(),
            aggregate: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            returning: Vec::new(),
            build_error: None,
        }
    }

    fn fail(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    fn parse_operator(&mut self, operator: &str) -> Option<Operator> {
        match operator.parse() {
            Ok(op) => Some(op),
            Err(e) => {
                self.fail(e.to_string());
                None
            }
        }
    }

    // ==================== SELECT list ====================

    /// Replace the select list with quoted columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns
            .into_iter()
            .map(|c| SelectItem::Column(c.into()))
            .collect();
        self.aggregate = None;
        self
    }

    /// Append a raw select expression (not quoted).
    pub fn select_raw(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(SelectItem::Raw(expr.into()));
        self.aggregate = None;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    fn aggregate(mut self, function: AggregateFn, column: impl Into<String>) -> Self {
        self.aggregate = Some(Aggregate {
            function,
            column: column.into(),
            alias: None,
        });
        self.columns.clear();
        self
    }

    /// Aggregate `COUNT(column)`; replaces the select list.
    pub fn select_count(self, column: impl Into<String>) -> Self {
        self.aggregate(AggregateFn::Count, column)
    }

    pub fn select_sum(self, column: impl Into<String>) -> Self {
        self.aggregate(AggregateFn::Sum, column)
    }

    pub fn select_avg(self, column: impl Into<String>) -> Self {
        self.aggregate(AggregateFn::Avg, column)
    }

    pub fn select_min(self, column: impl Into<String>) -> Self {
        self.aggregate(AggregateFn::Min, column)
    }

    pub fn select_max(self, column: impl Into<String>) -> Self {
        self.aggregate(AggregateFn::Max, column)
    }

    /// Alias for the aggregate result column.
    pub fn aggregate_as(mut self, alias: impl Into<String>) -> Self {
        match self.aggregate.as_mut() {
            Some(agg) => agg.alias = Some(alias.into()),
            None => self.fail("aggregate_as() called without an aggregate".to_string()),
        }
        self
    }

    // ==================== JOIN ====================

    fn push_join(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        left: impl Into<String>,
        operator: &str,
        right: impl Into<String>,
    ) -> Self {
        if let Some(operator) = self.parse_operator(operator) {
            self.joins.push(Join {
                kind,
                table: table.into(),
                left_column: left.into(),
                operator,
                right_column: right.into(),
            });
        }
        self
    }

    /// `INNER JOIN table ON left op right`
    pub fn join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        operator: &str,
        right: impl Into<String>,
    ) -> Self {
        self.push_join(JoinKind::Inner, table, left, operator, right)
    }

    pub fn left_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        operator: &str,
        right: impl Into<String>,
    ) -> Self {
        self.push_join(JoinKind::Left, table, left, operator, right)
    }

    pub fn right_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        operator: &str,
        right: impl Into<String>,
    ) -> Self {
        self.push_join(JoinKind::Right, table, left, operator, right)
    }

    // ==================== WHERE ====================

    /// Add WHERE: column op value
    pub fn where_op(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        if let Some(operator) = self.parse_operator(operator) {
            self.wheres.push(Predicate::Compare {
                column: column.into(),
                operator,
                value: value.into(),
            });
        }
        self
    }

    /// Add WHERE: column = value
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, "=", value)
    }

    /// Add WHERE: column IN (values)
    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        });
        self
    }

    /// Add WHERE: column NOT IN (values)
    pub fn where_not_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        });
        self
    }

    /// Add WHERE: column IS NULL
    pub fn where_null(mut self, column: impl Into<String>) -> Self {
        self.wheres.push(Predicate::Null {
            column: column.into(),
            negated: false,
        });
        self
    }

    /// Add WHERE: column IS NOT NULL
    pub fn where_not_null(mut self, column: impl Into<String>) -> Self {
        self.wheres.push(Predicate::Null {
            column: column.into(),
            negated: true,
        });
        self
    }

    /// Add a raw WHERE fragment with `?` markers, e.g. a subquery.
    pub fn where_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.wheres.push(Predicate::Raw {
            sql: sql.into(),
            bindings,
        });
        self
    }

    // ==================== GROUP BY / HAVING ====================

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add HAVING: column op value
    pub fn having(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        if let Some(operator) = self.parse_operator(operator) {
            self.havings.push(Predicate::Compare {
                column: column.into(),
                operator,
                value: value.into(),
            });
        }
        self
    }

    /// Add a raw HAVING fragment with `?` markers.
    pub fn having_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.havings.push(Predicate::Raw {
            sql: sql.into(),
            bindings,
        });
        self
    }

    // ==================== ORDER / pagination / RETURNING ====================

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Columns to return from INSERT/UPDATE/DELETE.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    // ==================== Accessors ====================

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn select_items(&self) -> &[SelectItem] {
        &self.columns
    }

    pub fn aggregate_spec(&self) -> Option<&Aggregate> {
        self.aggregate.as_ref()
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.wheres
    }

    pub fn having_predicates(&self) -> &[Predicate] {
        &self.havings
    }

    pub fn group_columns(&self) -> &[String] {
        &self.groups
    }

    pub fn order_specs(&self) -> &[OrderBy] {
        &self.orders
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn returning_columns(&self) -> &[String] {
        &self.returning
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Report the first builder error, if any.
    pub fn validate(&self) -> PolyResult<()> {
        if let Some(ref err) = self.build_error {
            return Err(PolyError::Validation(err.clone()));
        }
        if self.table.trim().is_empty() {
            return Err(PolyError::validation("statement has no table"));
        }
        Ok(())
    }

    // ==================== Compilation ====================

    /// Compile a SELECT for `dialect`.
    pub fn to_query(&self, dialect: Dialect) -> PolyResult<CompiledQuery> {
        self.validate()?;
        let grammar = dialect.query_grammar();
        let mut warnings = Vec::new();
        let fragment = grammar.compile_select(self, &mut warnings)?;
        let (sql, bindings) = fragment.into_parts();
        Ok(CompiledQuery {
            dialect,
            sql: grammar.rewrite_placeholders(&sql),
            bindings,
            out_params: Vec::new(),
            warnings,
        })
    }

    /// Compile an INSERT of `rows` for `dialect`.
    pub fn to_insert_query(&self, dialect: Dialect, rows: &[Record]) -> PolyResult<CompiledQuery> {
        self.validate()?;
        let grammar = dialect.query_grammar();
        if rows.len() > 1 && !self.returning.is_empty() && !grammar.supports_multi_row_returning()
        {
            return Err(PolyError::unsupported_operation(
                dialect,
                "RETURNING on multi-row INSERT",
            ));
        }
        let fragment = grammar.compile_insert(&self.table, rows)?;
        self.finish(dialect, fragment, Vec::new())
    }

    /// Compile an UPDATE setting `data` for `dialect`.
    pub fn to_update_query(&self, dialect: Dialect, data: &Record) -> PolyResult<CompiledQuery> {
        self.validate()?;
        let fragment = dialect.query_grammar().compile_update(self, data)?;
        self.finish(dialect, fragment, Vec::new())
    }

    /// Compile a DELETE for `dialect`.
    pub fn to_delete_query(&self, dialect: Dialect) -> PolyResult<CompiledQuery> {
        self.validate()?;
        let fragment = dialect.query_grammar().compile_delete(self)?;
        self.finish(dialect, fragment, Vec::new())
    }

    /// Rewrite placeholders and append the RETURNING clause after them, so
    /// output parameters are numbered after the input bindings.
    fn finish(
        &self,
        dialect: Dialect,
        fragment: crate::binder::SqlFragment,
        warnings: Vec<CompileWarning>,
    ) -> PolyResult<CompiledQuery> {
        let grammar = dialect.query_grammar();
        let (sql, bindings) = fragment.into_parts();
        let mut sql = grammar.rewrite_placeholders(&sql);
        let mut out_params = Vec::new();
        if !self.returning.is_empty() {
            let returning = grammar.compile_returning(&self.returning, bindings.len() + 1)?;
            sql.push_str(&returning.sql);
            out_params = returning.out_params;
        }
        Ok(CompiledQuery {
            dialect,
            sql,
            bindings,
            out_params,
            warnings,
        })
    }

    // ==================== Execution ====================

    /// Execute the SELECT and return all rows.
    pub async fn get<E: Executor + ?Sized>(&self, exec: &mut E) -> PolyResult<Vec<Row>> {
        let query = self.to_query(exec.dialect())?;
        exec.fetch(query).await
    }

    /// Execute the SELECT with `LIMIT 1` and return the first row, if any.
    pub async fn first<E: Executor + ?Sized>(&self, exec: &mut E) -> PolyResult<Option<Row>> {
        let query = self.clone().limit(1).to_query(exec.dialect())?;
        Ok(exec.fetch(query).await?.into_iter().next())
    }

    /// Like [`Statement::first`] but a missing row is [`PolyError::NotFound`].
    pub async fn first_or_fail<E: Executor + ?Sized>(&self, exec: &mut E) -> PolyResult<Row> {
        self.first(exec)
            .await?
            .ok_or_else(|| PolyError::not_found(format!("no row in '{}'", self.table)))
    }

    /// `COUNT(*)` over the current predicates (ordering and pagination dropped).
    pub async fn count<E: Executor + ?Sized>(&self, exec: &mut E) -> PolyResult<i64> {
        let mut counting = self.clone().select_count("*");
        counting.orders.clear();
        counting.limit = None;
        counting.offset = None;
        let query = counting.to_query(exec.dialect())?;
        let row = exec
            .fetch(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PolyError::not_found("COUNT returned no row"))?;
        row.get_index(0)
            .and_then(Value::as_i64)
            .ok_or_else(|| PolyError::validation("COUNT did not return an integer"))
    }

    /// INSERT `rows`; returns the affected row count.
    pub async fn insert<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        rows: &[Record],
    ) -> PolyResult<u64> {
        let query = self.to_insert_query(exec.dialect(), rows)?;
        exec.execute(query).await
    }

    /// INSERT `rows` and return the [`Statement::returning`] columns.
    pub async fn insert_returning<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        rows: &[Record],
    ) -> PolyResult<Vec<Row>> {
        self.require_returning()?;
        let query = self.to_insert_query(exec.dialect(), rows)?;
        exec.fetch(query).await
    }

    /// UPDATE with `data`; returns the affected row count.
    pub async fn update<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        data: &Record,
    ) -> PolyResult<u64> {
        let query = self.to_update_query(exec.dialect(), data)?;
        exec.execute(query).await
    }

    pub async fn update_returning<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        data: &Record,
    ) -> PolyResult<Vec<Row>> {
        self.require_returning()?;
        let query = self.to_update_query(exec.dialect(), data)?;
        exec.fetch(query).await
    }

    /// DELETE matching rows; returns the affected row count.
    pub async fn delete<E: Executor + ?Sized>(&self, exec: &mut E) -> PolyResult<u64> {
        let query = self.to_delete_query(exec.dialect())?;
        exec.execute(query).await
    }

    pub async fn delete_returning<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
    ) -> PolyResult<Vec<Row>> {
        self.require_returning()?;
        let query = self.to_delete_query(exec.dialect())?;
        exec.fetch(query).await
    }

    fn require_returning(&self) -> PolyResult<()> {
        if self.returning.is_empty() {
            return Err(PolyError::validation(
                "call .returning([...]) before a *_returning terminal",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operator_is_reported_on_compile() {
        let stmt = Statement::table("users").where_op("id", "~~", 1);
        let err = stmt.to_query(Dialect::Postgres).unwrap_err();
        assert!(matches!(err, PolyError::Validation(_)));
    }

    #[test]
    fn aggregate_replaces_columns() {
        let stmt = Statement::table("orders").select(["id"]).select_sum("total");
        assert!(stmt.select_items().is_empty());
        assert_eq!(stmt.aggregate_spec().unwrap().function, AggregateFn::Sum);

        let stmt = stmt.select(["id"]);
        assert!(stmt.aggregate_spec().is_none());
    }

    #[test]
    fn operator_parsing() {
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("NOT LIKE".parse::<Operator>().unwrap(), Operator::NotLike);
        assert!("between".parse::<Operator>().is_err());
    }

    #[test]
    fn returning_terminal_requires_columns() {
        let stmt = Statement::table("users");
        assert!(stmt.require_returning().is_err());
        assert!(stmt.returning(["id"]).require_returning().is_ok());
    }
}
