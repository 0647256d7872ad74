//! DDL rules shared by the schema grammars.

use super::SchemaGrammar;
use crate::error::{PolyError, PolyResult};
use crate::schema::{Blueprint, ColumnDefault, ColumnDefinition, ForeignKey, TableCommand};
use crate::value::Value;

pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render a default value as a SQL literal.
pub fn literal<G: SchemaGrammar + ?Sized>(g: &G, value: &Value) -> PolyResult<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => g.bool_literal(*b).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(f) => {
            return Err(PolyError::unsupported_type(
                g.dialect(),
                f.to_string(),
                "column defaults must be finite numbers",
            ));
        }
        Value::Text(s) => quote_string(s),
        Value::Json(j) => quote_string(&j.to_string()),
        Value::Timestamp(t) => quote_string(&t.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::TimestampTz(t) => quote_string(&t.to_rfc3339()),
        Value::Bytes(_) => {
            return Err(PolyError::unsupported_type(
                g.dialect(),
                "bytes",
                "binary column defaults",
            ));
        }
    })
}

/// `string(n)` with `0 < n <= max`.
pub fn check_length<G: SchemaGrammar + ?Sized>(g: &G, length: u32, max: u32) -> PolyResult<()> {
    if length == 0 || length > max {
        return Err(PolyError::unsupported_type(
            g.dialect(),
            format!("string({length})"),
            format!("length must be between 1 and {max}"),
        ));
    }
    Ok(())
}

/// `decimal(p, s)` with `0 < p <= max` and `s <= p`.
pub fn check_decimal<G: SchemaGrammar + ?Sized>(
    g: &G,
    precision: u32,
    scale: u32,
    max: u32,
) -> PolyResult<()> {
    if precision == 0 || precision > max {
        return Err(PolyError::unsupported_type(
            g.dialect(),
            format!("decimal({precision},{scale})"),
            format!("precision must be between 1 and {max}"),
        ));
    }
    if scale > precision {
        return Err(PolyError::unsupported_type(
            g.dialect(),
            format!("decimal({precision},{scale})"),
            "scale exceeds precision",
        ));
    }
    Ok(())
}

/// `NAME TYPE [DEFAULT v] [NOT NULL] [AUTO_INCREMENT] [PRIMARY KEY|UNIQUE]`
pub fn column<G: SchemaGrammar + ?Sized>(g: &G, col: &ColumnDefinition) -> PolyResult<String> {
    let mut sql = format!("{} {}", g.wrap(&col.name), g.column_type(col)?);
    match &col.default {
        Some(ColumnDefault::Value(v)) => {
            sql.push_str(" DEFAULT ");
            sql.push_str(&literal(g, v)?);
        }
        Some(ColumnDefault::Raw(expr)) => {
            sql.push_str(" DEFAULT ");
            sql.push_str(expr);
        }
        None => {}
    }
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if col.column_type.is_auto_increment() {
        if let Some(modifier) = g.auto_increment_modifier() {
            sql.push(' ');
            sql.push_str(modifier);
        }
    }
    if col.primary {
        sql.push_str(" PRIMARY KEY");
    } else if col.unique {
        sql.push_str(" UNIQUE");
    }
    Ok(sql)
}

pub fn columnize<G: SchemaGrammar + ?Sized>(g: &G, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| g.wrap(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `{table}_{col1}_{col2}_{suffix}`, lower-cased, dots flattened.
pub fn default_name(table: &str, columns: &[String], suffix: &str) -> String {
    let mut parts = vec![table.replace('.', "_")];
    parts.extend(columns.iter().map(|c| c.replace('.', "_")));
    parts.push(suffix.to_string());
    parts.join("_").to_lowercase()
}

pub fn primary_constraint<G: SchemaGrammar + ?Sized>(
    g: &G,
    table: &str,
    name: Option<&str>,
    columns: &[String],
) -> String {
    let name = match name {
        Some(n) => n.to_string(),
        None => g.short_name(&format!("{}_pkey", table.replace('.', "_").to_lowercase())),
    };
    format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        g.wrap(&name),
        columnize(g, columns)
    )
}

pub fn foreign_constraint<G: SchemaGrammar + ?Sized>(
    g: &G,
    table: &str,
    fk: &ForeignKey,
) -> PolyResult<String> {
    if fk.columns.is_empty() || fk.on_table.is_empty() || fk.references.is_empty() {
        return Err(PolyError::validation(
            "foreign key needs columns, references(...) and on(...)",
        ));
    }
    let name = match &fk.name {
        Some(n) => n.clone(),
        None => g.short_name(&default_name(table, &fk.columns, "foreign")),
    };
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        g.wrap(&name),
        columnize(g, &fk.columns),
        g.wrap(&fk.on_table),
        columnize(g, &fk.references)
    );
    if let Some(action) = &fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(&action.to_uppercase());
    }
    if let Some(action) = &fk.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(&action.to_uppercase());
    }
    Ok(sql)
}

pub fn create_index<G: SchemaGrammar + ?Sized>(
    g: &G,
    table: &str,
    name: Option<&str>,
    columns: &[String],
) -> String {
    let name = match name {
        Some(n) => n.to_string(),
        None => g.short_name(&default_name(table, columns, "index")),
    };
    format!(
        "CREATE INDEX {} ON {} ({})",
        g.wrap(&name),
        g.wrap(table),
        columnize(g, columns)
    )
}

/// The single auto-increment column of a blueprint, if any.
pub fn auto_increment_column(blueprint: &Blueprint) -> PolyResult<Option<&ColumnDefinition>> {
    let mut autos = blueprint
        .columns
        .iter()
        .filter(|c| c.column_type.is_auto_increment());
    let first = autos.next();
    if autos.next().is_some() {
        return Err(PolyError::validation(format!(
            "table '{}' declares more than one auto-increment column",
            blueprint.table
        )));
    }
    Ok(first)
}

/// CREATE TABLE with inline constraints, followed by CREATE INDEX statements.
pub fn create_table<G: SchemaGrammar + ?Sized>(
    g: &G,
    blueprint: &Blueprint,
) -> PolyResult<Vec<String>> {
    let table = blueprint.table.as_str();
    if blueprint.columns.is_empty() {
        return Err(PolyError::validation(format!(
            "table '{table}' has no columns"
        )));
    }
    auto_increment_column(blueprint)?;

    let mut defs = blueprint
        .columns
        .iter()
        .map(|c| g.compile_column(c))
        .collect::<PolyResult<Vec<_>>>()?;
    let mut after = Vec::new();

    for command in &blueprint.commands {
        match command {
            TableCommand::Primary { name, columns } => {
                defs.push(primary_constraint(g, table, name.as_deref(), columns));
            }
            TableCommand::Foreign(fk) => defs.push(g.compile_foreign(table, fk)?),
            TableCommand::Index { name, columns } => {
                after.push(create_index(g, table, name.as_deref(), columns));
            }
            other => {
                return Err(PolyError::validation(format!(
                    "{other:?} is only valid when altering a table"
                )));
            }
        }
    }

    let mut statements = vec![format!(
        "CREATE TABLE {} ({})",
        g.wrap(table),
        defs.join(", ")
    )];
    statements.extend(after);
    Ok(statements)
}

/// One statement per added column and per command, in declaration order.
pub fn alter_table<G: SchemaGrammar + ?Sized>(
    g: &G,
    blueprint: &Blueprint,
) -> PolyResult<Vec<String>> {
    let table = blueprint.table.as_str();
    if blueprint.columns.is_empty() && blueprint.commands.is_empty() {
        return Err(PolyError::validation(format!(
            "alter of '{table}' has nothing to do"
        )));
    }
    auto_increment_column(blueprint)?;

    let wrapped = g.wrap(table);
    let mut statements = Vec::new();
    for column in &blueprint.columns {
        statements.extend(g.compile_add_column(table, column)?);
    }
    for command in &blueprint.commands {
        let sql = match command {
            TableCommand::Index { name, columns } => {
                create_index(g, table, name.as_deref(), columns)
            }
            TableCommand::Primary { name, columns } => format!(
                "ALTER TABLE {wrapped} ADD {}",
                primary_constraint(g, table, name.as_deref(), columns)
            ),
            TableCommand::Foreign(fk) => {
                format!("ALTER TABLE {wrapped} ADD {}", g.compile_foreign(table, fk)?)
            }
            TableCommand::DropColumn(column) => {
                format!("ALTER TABLE {wrapped} DROP COLUMN {}", g.wrap(column))
            }
            TableCommand::RenameColumn { from, to } => g.compile_rename_column(table, from, to),
            TableCommand::DropIndex(name) => g.compile_drop_index(table, name),
            TableCommand::DropForeign(name) => g.compile_drop_foreign(table, name),
        };
        statements.push(sql);
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names() {
        let cols = vec!["user_id".to_string(), "Role".to_string()];
        assert_eq!(default_name("Users", &cols, "index"), "users_user_id_role_index");
        assert_eq!(default_name("app.users", &cols[..1], "foreign"), "app_users_user_id_foreign");
    }

    #[test]
    fn non_finite_float_defaults_are_rejected() {
        let g = super::super::PostgresSchemaGrammar;
        assert_eq!(literal(&g, &Value::Float(2.5)).unwrap(), "2.5");
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = literal(&g, &Value::Float(f)).unwrap_err();
            assert!(matches!(err, PolyError::UnsupportedType { .. }));
        }
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(quote_string("it's"), "'it''s'");
    }
}
