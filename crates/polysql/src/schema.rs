//! Table definitions and the schema builder.
//!
//! A [`Blueprint`] collects column definitions and table commands inside a
//! configuration closure; the dialect's schema grammar turns it into DDL.
//!
//! ```ignore
//! use polysql::Schema;
//!
//! Schema::on(&mut db)
//!     .create_table("users", |table| {
//!         table.increments("id");
//!         table.string("email", 255).not_nullable().unique();
//!         table.timestamp("created_at").default_raw("CURRENT_TIMESTAMP");
//!     })
//!     .await?;
//! ```

use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::PolyResult;
use crate::executor::Executor;
use crate::value::Value;
use std::fmt;

/// Generic column type, mapped per dialect by the schema grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Increments,
    BigIncrements,
    String(u32),
    Text,
    SmallInteger,
    Integer,
    BigInteger,
    Boolean,
    Decimal { precision: u32, scale: u32 },
    Timestamp,
    TimestampTz,
    Json,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Increments => "increments",
            ColumnType::BigIncrements => "bigIncrements",
            ColumnType::String(_) => "string",
            ColumnType::Text => "text",
            ColumnType::SmallInteger => "smallInteger",
            ColumnType::Integer => "integer",
            ColumnType::BigInteger => "bigInteger",
            ColumnType::Boolean => "boolean",
            ColumnType::Decimal { .. } => "decimal",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TimestampTz => "timestampTz",
            ColumnType::Json => "json",
        }
    }

    pub fn is_auto_increment(&self) -> bool {
        matches!(self, ColumnType::Increments | ColumnType::BigIncrements)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String(len) => write!(f, "string({len})"),
            ColumnType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// Literal value, rendered per dialect.
    Value(Value),
    /// Expression emitted verbatim (e.g. `CURRENT_TIMESTAMP`).
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let auto = column_type.is_auto_increment();
        Self {
            name: name.into(),
            column_type,
            nullable: !auto,
            unique: false,
            primary: auto,
            default: None,
        }
    }

    pub fn not_nullable(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    pub fn default_to(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.default = Some(ColumnDefault::Raw(sql.into()));
        self
    }
}

/// Foreign key constraint, built with consuming setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub on_table: String,
    pub references: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKey {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            on_table: String::new(),
            references: Vec::new(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn references<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn on(mut self, table: impl Into<String>) -> Self {
        self.on_table = table.into();
        self
    }

    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Table-level operations recorded on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableCommand {
    Index {
        name: Option<String>,
        columns: Vec<String>,
    },
    Primary {
        name: Option<String>,
        columns: Vec<String>,
    },
    Foreign(ForeignKey),
    DropColumn(String),
    RenameColumn { from: String, to: String },
    DropIndex(String),
    DropForeign(String),
}

/// Table definition consumed by a schema grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    pub commands: Vec<TableCommand>,
}

fn names<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into).collect()
}

impl Blueprint {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Add a column of any type.
    pub fn column(&mut self, name: impl Into<String>, column_type: ColumnType) -> &mut ColumnDefinition {
        let idx = self.columns.len();
        self.columns.push(ColumnDefinition::new(name, column_type));
        &mut self.columns[idx]
    }

    pub fn increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Increments)
    }

    pub fn big_increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigIncrements)
    }

    pub fn string(&mut self, name: impl Into<String>, length: u32) -> &mut ColumnDefinition {
        self.column(name, ColumnType::String(length))
    }

    pub fn text(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    pub fn small_integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::SmallInteger)
    }

    pub fn integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    pub fn big_integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigInteger)
    }

    pub fn boolean(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Boolean)
    }

    pub fn decimal(
        &mut self,
        name: impl Into<String>,
        precision: u32,
        scale: u32,
    ) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Decimal { precision, scale })
    }

    pub fn timestamp(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Timestamp)
    }

    pub fn timestamp_tz(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::TimestampTz)
    }

    pub fn json(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Json)
    }

    /// Nullable `created_at` / `updated_at` timestamps.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at");
        self.timestamp("updated_at");
    }

    pub fn index<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(TableCommand::Index {
            name: None,
            columns: names(columns),
        });
    }

    pub fn index_named<I, S>(&mut self, name: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(TableCommand::Index {
            name: Some(name.into()),
            columns: names(columns),
        });
    }

    /// Composite primary key.
    pub fn primary<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(TableCommand::Primary {
            name: None,
            columns: names(columns),
        });
    }

    pub fn foreign(&mut self, foreign: ForeignKey) {
        self.commands.push(TableCommand::Foreign(foreign));
    }

    pub fn drop_column(&mut self, name: impl Into<String>) {
        self.commands.push(TableCommand::DropColumn(name.into()));
    }

    pub fn rename_column(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.commands.push(TableCommand::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
    }

    pub fn drop_index(&mut self, name: impl Into<String>) {
        self.commands.push(TableCommand::DropIndex(name.into()));
    }

    pub fn drop_foreign(&mut self, name: impl Into<String>) {
        self.commands.push(TableCommand::DropForeign(name.into()));
    }

    /// Compile CREATE TABLE (plus follow-up statements) for `dialect`.
    pub fn to_create_sql(&self, dialect: Dialect) -> PolyResult<Vec<String>> {
        dialect.schema_grammar().compile_create_table(self)
    }

    /// Compile ALTER TABLE statements for `dialect`.
    pub fn to_alter_sql(&self, dialect: Dialect) -> PolyResult<Vec<String>> {
        dialect.schema_grammar().compile_alter_table(self)
    }
}

/// Runs schema changes through an [`Executor`].
pub struct Schema<'a, E: Executor + ?Sized> {
    exec: &'a mut E,
}

impl<'a, E: Executor + ?Sized> Schema<'a, E> {
    pub fn on(exec: &'a mut E) -> Self {
        Self { exec }
    }

    async fn run_all(&mut self, statements: Vec<String>) -> PolyResult<()> {
        for sql in statements {
            self.exec.execute_script(&sql).await?;
        }
        Ok(())
    }

    pub async fn create_table<F>(&mut self, table: &str, build: F) -> PolyResult<()>
    where
        F: FnOnce(&mut Blueprint),
    {
        let mut blueprint = Blueprint::new(table);
        build(&mut blueprint);
        let statements = blueprint.to_create_sql(self.exec.dialect())?;
        self.run_all(statements).await
    }

    pub async fn alter_table<F>(&mut self, table: &str, build: F) -> PolyResult<()>
    where
        F: FnOnce(&mut Blueprint),
    {
        let mut blueprint = Blueprint::new(table);
        build(&mut blueprint);
        let statements = blueprint.to_alter_sql(self.exec.dialect())?;
        self.run_all(statements).await
    }

    pub async fn drop_table(&mut self, table: &str) -> PolyResult<()> {
        let sql = self.exec.dialect().schema_grammar().compile_drop_table(table);
        self.exec.execute_script(&sql).await
    }

    pub async fn drop_table_if_exists(&mut self, table: &str) -> PolyResult<()> {
        let sql = self
            .exec
            .dialect()
            .schema_grammar()
            .compile_drop_table_if_exists(table);
        self.exec.execute_script(&sql).await
    }

    pub async fn rename_table(&mut self, from: &str, to: &str) -> PolyResult<()> {
        let sql = self
            .exec
            .dialect()
            .schema_grammar()
            .compile_rename_table(from, to);
        self.exec.execute_script(&sql).await
    }

    pub async fn has_table(&mut self, table: &str) -> PolyResult<bool> {
        let query: CompiledQuery = self.exec.dialect().schema_grammar().compile_has_table(table)?;
        Ok(!self.exec.fetch(query).await?.is_empty())
    }

    pub async fn has_column(&mut self, table: &str, column: &str) -> PolyResult<bool> {
        let query = self
            .exec
            .dialect()
            .schema_grammar()
            .compile_has_column(table, column)?;
        Ok(!self.exec.fetch(query).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_are_primary_and_not_null() {
        let mut bp = Blueprint::new("users");
        bp.increments("id");
        let col = &bp.columns[0];
        assert!(col.primary);
        assert!(!col.nullable);
    }

    #[test]
    fn modifiers_chain() {
        let mut bp = Blueprint::new("users");
        bp.string("email", 255).not_nullable().unique().default_to("");
        let col = &bp.columns[0];
        assert!(!col.nullable && col.unique);
        assert_eq!(col.default, Some(ColumnDefault::Value(Value::from(""))));
    }

    #[test]
    fn column_type_display() {
        assert_eq!(ColumnType::String(40).to_string(), "string(40)");
        assert_eq!(
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
            .to_string(),
            "decimal(10,2)"
        );
        assert_eq!(ColumnType::TimestampTz.to_string(), "timestampTz");
    }
}
