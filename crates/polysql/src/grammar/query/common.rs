//! Compilation rules shared by the query grammars.

use super::QueryGrammar;
use crate::binder::{SqlFragment, count_placeholders};
use crate::error::{PolyError, PolyResult};
use crate::statement::{Aggregate, Join, OrderBy, Predicate, SelectItem, Statement};
use crate::value::{Record, Value};

/// Quote a dotted identifier, keeping `*` and splitting a trailing ` as ` alias.
pub fn wrap<G: QueryGrammar + ?Sized>(g: &G, value: &str) -> String {
    let value = value.trim();
    if let Some(pos) = value.to_ascii_lowercase().find(" as ") {
        let (expr, alias) = (&value[..pos], &value[pos + 4..]);
        return format!("{} AS {}", wrap(g, expr), g.quote_identifier(alias.trim()));
    }
    value
        .split('.')
        .map(|part| {
            if part == "*" {
                part.to_string()
            } else {
                g.quote_identifier(part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

pub fn columnize<G: QueryGrammar + ?Sized>(g: &G, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| wrap(g, c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn aggregate<G: QueryGrammar + ?Sized>(g: &G, agg: &Aggregate, distinct: bool) -> String {
    let column = if agg.column == "*" {
        "*".to_string()
    } else {
        wrap(g, &agg.column)
    };
    let distinct = if distinct && agg.column != "*" {
        "DISTINCT "
    } else {
        ""
    };
    let mut sql = format!("{}({distinct}{column})", agg.function);
    if let Some(alias) = &agg.alias {
        sql.push_str(" AS ");
        sql.push_str(&g.quote_identifier(alias));
    }
    sql
}

fn select_list<G: QueryGrammar + ?Sized>(g: &G, stmt: &Statement) -> String {
    if let Some(agg) = stmt.aggregate_spec() {
        return format!("SELECT {}", aggregate(g, agg, stmt.is_distinct()));
    }
    let columns = if stmt.select_items().is_empty() {
        "*".to_string()
    } else {
        stmt.select_items()
            .iter()
            .map(|item| match item {
                SelectItem::Column(c) => wrap(g, c),
                SelectItem::Raw(expr) => expr.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    if stmt.is_distinct() {
        format!("SELECT DISTINCT {columns}")
    } else {
        format!("SELECT {columns}")
    }
}

fn joins<G: QueryGrammar + ?Sized>(g: &G, joins: &[Join]) -> PolyResult<String> {
    let mut sql = String::new();
    for join in joins {
        sql.push_str(&format!(
            " {} {} ON {} {} {}",
            join.kind.as_sql(),
            wrap(g, &join.table),
            wrap(g, &join.left_column),
            g.operator_sql(join.operator)?,
            wrap(g, &join.right_column),
        ));
    }
    Ok(sql)
}

fn predicate<G: QueryGrammar + ?Sized>(g: &G, p: &Predicate) -> PolyResult<SqlFragment> {
    let mut out = SqlFragment::new();
    match p {
        Predicate::Compare {
            column,
            operator,
            value,
        } => {
            out.push(&wrap(g, column))
                .push(" ")
                .push(g.operator_sql(*operator)?)
                .push(" ")
                .push_bind(value.clone());
        }
        Predicate::In {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                out.push(if *negated { "1 = 1" } else { "1 = 0" });
            } else {
                out.push(&wrap(g, column))
                    .push(if *negated { " NOT IN (" } else { " IN (" })
                    .push_bind_list(values.iter().cloned())
                    .push(")");
            }
        }
        Predicate::Null { column, negated } => {
            out.push(&wrap(g, column))
                .push(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Predicate::Raw { sql, bindings } => {
            let markers = count_placeholders(sql, g.placeholder_style());
            if markers != bindings.len() {
                return Err(PolyError::validation(format!(
                    "raw fragment has {markers} placeholders but {} bindings: {sql}",
                    bindings.len()
                )));
            }
            out.push("(")
                .append(SqlFragment::with_bindings(sql.clone(), bindings.clone()))
                .push(")");
        }
    }
    Ok(out)
}

/// ` WHERE a AND b` / ` HAVING ...`, or an empty fragment.
pub fn predicates<G: QueryGrammar + ?Sized>(
    g: &G,
    keyword: &str,
    preds: &[Predicate],
) -> PolyResult<SqlFragment> {
    let mut out = SqlFragment::new();
    if preds.is_empty() {
        return Ok(out);
    }
    let compiled = preds
        .iter()
        .map(|p| predicate(g, p))
        .collect::<PolyResult<Vec<_>>>()?;
    out.push(" ").push(keyword).push(" ");
    out.append_joined(compiled, " AND ");
    Ok(out)
}

pub fn order_by<G: QueryGrammar + ?Sized>(g: &G, orders: &[OrderBy]) -> String {
    if orders.is_empty() {
        return String::new();
    }
    let list = orders
        .iter()
        .map(|o| format!("{} {}", wrap(g, &o.column), o.direction.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" ORDER BY {list}")
}

/// SELECT through HAVING; ordering and pagination are left to the dialect.
pub fn select_core<G: QueryGrammar + ?Sized>(g: &G, stmt: &Statement) -> PolyResult<SqlFragment> {
    let mut out = SqlFragment::raw(select_list(g, stmt));
    out.push(" FROM ").push(&wrap(g, stmt.table_name()));
    out.push(&joins(g, stmt.joins())?);
    out.append(predicates(g, "WHERE", stmt.predicates())?);
    if !stmt.group_columns().is_empty() {
        out.push(" GROUP BY ")
            .push(&columnize(g, stmt.group_columns()));
    }
    out.append(predicates(g, "HAVING", stmt.having_predicates())?);
    Ok(out)
}

/// ` LIMIT n OFFSET m` (Postgres / MySQL).
pub fn limit_offset(limit: Option<u64>, offset: Option<u64>) -> String {
    let mut sql = String::new();
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
    sql
}

/// ` OFFSET m ROWS FETCH NEXT n ROWS ONLY` (MSSQL / Oracle).
pub fn offset_fetch(limit: Option<u64>, offset: Option<u64>) -> String {
    let mut sql = String::new();
    if limit.is_some() || offset.is_some() {
        sql.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
        if let Some(limit) = limit {
            sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }
    }
    sql
}

pub fn insert_columns(rows: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

/// Column list plus per-row values (NULL where a row lacks a column).
pub fn insert_matrix(rows: &[Record]) -> PolyResult<(Vec<String>, Vec<Vec<Value>>)> {
    let columns = insert_columns(rows);
    if columns.is_empty() {
        return Err(PolyError::validation("insert requires at least one column"));
    }
    let values = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Ok((columns, values))
}

fn values_tuple(values: Vec<Value>) -> SqlFragment {
    let mut out = SqlFragment::raw("(");
    out.push_bind_list(values).push(")");
    out
}

/// `INSERT INTO t (cols) VALUES (...), (...)`
pub fn compile_insert_values<G: QueryGrammar + ?Sized>(
    g: &G,
    table: &str,
    rows: &[Record],
) -> PolyResult<SqlFragment> {
    let (columns, values) = insert_matrix(rows)?;
    let mut out = SqlFragment::raw(format!(
        "INSERT INTO {} ({}) VALUES ",
        wrap(g, table),
        columnize(g, &columns)
    ));
    out.append_joined(values.into_iter().map(values_tuple), ", ");
    Ok(out)
}

/// `INSERT ALL INTO t (cols) VALUES (...) ... SELECT 1 FROM DUAL`
pub fn compile_insert_all<G: QueryGrammar + ?Sized>(
    g: &G,
    table: &str,
    rows: &[Record],
) -> PolyResult<SqlFragment> {
    let (columns, values) = insert_matrix(rows)?;
    let into = format!(
        " INTO {} ({}) VALUES ",
        wrap(g, table),
        columnize(g, &columns)
    );
    let mut out = SqlFragment::raw("INSERT ALL");
    for row in values {
        out.push(&into).append(values_tuple(row));
    }
    out.push(" SELECT 1 FROM DUAL");
    Ok(out)
}

fn reject_joins<G: QueryGrammar + ?Sized>(g: &G, stmt: &Statement, op: &str) -> PolyResult<()> {
    if !stmt.joins().is_empty() {
        return Err(PolyError::unsupported_operation(
            g.dialect(),
            format!("JOIN in {op}"),
        ));
    }
    Ok(())
}

/// LIMIT / OFFSET have no portable meaning on UPDATE and DELETE.
pub fn reject_pagination<G: QueryGrammar + ?Sized>(
    g: &G,
    stmt: &Statement,
    op: &str,
) -> PolyResult<()> {
    if stmt.limit_value().is_some() || stmt.offset_value().is_some() {
        return Err(PolyError::unsupported_operation(
            g.dialect(),
            format!("LIMIT/OFFSET in {op}"),
        ));
    }
    Ok(())
}

/// `UPDATE t SET a = ?, ... WHERE ...`; data bindings precede predicate bindings.
pub fn compile_update<G: QueryGrammar + ?Sized>(
    g: &G,
    stmt: &Statement,
    data: &Record,
) -> PolyResult<SqlFragment> {
    if data.is_empty() {
        return Err(PolyError::validation("update requires at least one column"));
    }
    reject_joins(g, stmt, "UPDATE")?;
    let assignments = data.iter().map(|(column, value)| {
        let mut f = SqlFragment::raw(format!("{} = ", wrap(g, column)));
        f.push_bind(value.clone());
        f
    });
    let mut out = SqlFragment::raw(format!("UPDATE {} SET ", wrap(g, stmt.table_name())));
    out.append_joined(assignments, ", ");
    out.append(predicates(g, "WHERE", stmt.predicates())?);
    Ok(out)
}

/// `DELETE FROM t WHERE ...`
pub fn compile_delete<G: QueryGrammar + ?Sized>(
    g: &G,
    stmt: &Statement,
) -> PolyResult<SqlFragment> {
    reject_joins(g, stmt, "DELETE")?;
    let mut out = SqlFragment::raw(format!("DELETE FROM {}", wrap(g, stmt.table_name())));
    out.append(predicates(g, "WHERE", stmt.predicates())?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::query::{MsSqlGrammar, PostgresGrammar};

    #[test]
    fn wrap_handles_dots_alias_and_star() {
        assert_eq!(wrap(&PostgresGrammar, "users.id"), r#""users"."id""#);
        assert_eq!(wrap(&PostgresGrammar, "u.*"), r#""u".*"#);
        assert_eq!(
            wrap(&MsSqlGrammar, "users.name AS display"),
            "[users].[name] AS [display]"
        );
    }

    #[test]
    fn offset_fetch_defaults_offset_to_zero() {
        assert_eq!(offset_fetch(Some(5), None), " OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY");
        assert_eq!(offset_fetch(None, Some(3)), " OFFSET 3 ROWS");
        assert_eq!(offset_fetch(None, None), "");
    }
}
