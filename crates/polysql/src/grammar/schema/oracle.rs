use super::SchemaGrammar;
use super::common::{self, check_decimal, check_length, quote_string};
use crate::compiled::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::{PolyError, PolyResult};
use crate::schema::{Blueprint, ColumnDefinition, ColumnType, ForeignKey};
use crate::value::Value;

/// Oracle identifier length limit (pre-12.2).
const MAX_IDENTIFIER: usize = 30;
const KEEP_PREFIX: usize = 23;

/// ORA-00942: table or view does not exist.
const TABLE_MISSING: i32 = -942;
/// ORA-02289: sequence does not exist.
const SEQUENCE_MISSING: i32 = -2289;

fn fnv1a(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Shorten a generated name to the identifier limit.
///
/// Long names keep a 23-char prefix plus `_` and 6 hex digits of a stable
/// hash of the full name, so distinct long names stay distinct.
pub fn oracle_identifier(name: &str) -> String {
    if name.chars().count() <= MAX_IDENTIFIER {
        return name.to_string();
    }
    let prefix: String = name.chars().take(KEEP_PREFIX).collect();
    format!("{prefix}_{:06x}", fnv1a(name) & 0x00ff_ffff)
}

fn sequence_name(table: &str) -> String {
    oracle_identifier(&format!("{}_seq", table.replace('.', "_")))
}

fn trigger_name(table: &str) -> String {
    oracle_identifier(&format!("{}_autoinc_trg", table.replace('.', "_")))
}

/// Swallow one ORA code around a dynamic DDL statement, re-raise anything else.
fn guarded(ddl: &str, code: i32) -> String {
    format!(
        "BEGIN EXECUTE IMMEDIATE {}; EXCEPTION WHEN OTHERS THEN IF SQLCODE != {code} THEN RAISE; END IF; END;",
        quote_string(ddl)
    )
}

pub struct OracleSchemaGrammar;

impl OracleSchemaGrammar {
    /// CREATE SEQUENCE + CREATE OR REPLACE TRIGGER emulating auto-increment.
    fn auto_increment(&self, table: &str, column: &ColumnDefinition) -> Vec<String> {
        let sequence = self.wrap(&sequence_name(table));
        let key = self.wrap(&column.name);
        vec![
            format!("CREATE SEQUENCE {sequence}"),
            format!(
                "CREATE OR REPLACE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW \
                 WHEN (NEW.{key} IS NULL) BEGIN :NEW.{key} := {sequence}.NEXTVAL; END;",
                self.wrap(&trigger_name(table)),
                self.wrap(table),
            ),
        ]
    }
}

impl SchemaGrammar for OracleSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn column_type(&self, column: &ColumnDefinition) -> PolyResult<String> {
        Ok(match column.column_type {
            ColumnType::Increments | ColumnType::Integer => "NUMBER(10)".to_string(),
            ColumnType::BigIncrements | ColumnType::BigInteger => "NUMBER(20)".to_string(),
            ColumnType::String(len) => {
                check_length(self, len, 4000)?;
                format!("VARCHAR2({len})")
            }
            ColumnType::Text | ColumnType::Json => "CLOB".to_string(),
            ColumnType::SmallInteger => "NUMBER(5)".to_string(),
            ColumnType::Boolean => "NUMBER(1)".to_string(),
            ColumnType::Decimal { precision, scale } => {
                check_decimal(self, precision, scale, 38)?;
                format!("NUMBER({precision},{scale})")
            }
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TIMESTAMP WITH TIME ZONE".to_string(),
        })
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn short_name(&self, name: &str) -> String {
        oracle_identifier(name)
    }

    fn compile_foreign(&self, table: &str, foreign: &ForeignKey) -> PolyResult<String> {
        if foreign.on_update.is_some() {
            return Err(PolyError::unsupported_operation(
                Dialect::Oracle,
                "ON UPDATE in foreign keys",
            ));
        }
        common::foreign_constraint(self, table, foreign)
    }

    /// CREATE TABLE, then sequence and trigger when an auto-increment
    /// column exists, then indexes.
    fn compile_create_table(&self, blueprint: &Blueprint) -> PolyResult<Vec<String>> {
        let mut statements = common::create_table(self, blueprint)?;
        if let Some(column) = common::auto_increment_column(blueprint)? {
            let emulation = self.auto_increment(&blueprint.table, column);
            statements.splice(1..1, emulation);
        }
        Ok(statements)
    }

    fn compile_add_column(&self, table: &str, column: &ColumnDefinition) -> PolyResult<Vec<String>> {
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD ({})",
            self.wrap(table),
            self.compile_column(column)?
        )];
        if column.column_type.is_auto_increment() {
            statements.extend(self.auto_increment(table, column));
        }
        Ok(statements)
    }

    /// Drops the table and its auto-increment sequence, if any.
    fn compile_drop_table(&self, table: &str) -> String {
        format!(
            "BEGIN EXECUTE IMMEDIATE {}; {} END;",
            quote_string(&format!("DROP TABLE {}", self.wrap(table))),
            guarded(
                &format!("DROP SEQUENCE {}", self.wrap(&sequence_name(table))),
                SEQUENCE_MISSING
            ),
        )
    }

    fn compile_drop_table_if_exists(&self, table: &str) -> String {
        format!(
            "BEGIN {} {} END;",
            guarded(&format!("DROP TABLE {}", self.wrap(table)), TABLE_MISSING),
            guarded(
                &format!("DROP SEQUENCE {}", self.wrap(&sequence_name(table))),
                SEQUENCE_MISSING
            ),
        )
    }

    /// Renames the table and carries its auto-increment sequence and trigger
    /// over to the new name. The trigger is rebuilt around the key column
    /// recorded in `USER_TRIGGER_COLS`.
    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        let old_trigger = trigger_name(from).to_uppercase();
        let new_sequence = self.wrap(&sequence_name(to));
        let head = format!(
            "CREATE OR REPLACE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW WHEN (NEW.\"",
            self.wrap(&trigger_name(to)),
            self.wrap(to),
        );
        let tail = format!("\" := {new_sequence}.NEXTVAL; END;");
        format!(
            "DECLARE key_column VARCHAR2(128); BEGIN EXECUTE IMMEDIATE {}; {} \
             BEGIN SELECT COLUMN_NAME INTO key_column FROM USER_TRIGGER_COLS \
             WHERE TRIGGER_NAME = {} AND ROWNUM = 1; \
             EXECUTE IMMEDIATE {}; \
             EXECUTE IMMEDIATE {} || key_column || {} || key_column || {}; \
             EXCEPTION WHEN NO_DATA_FOUND THEN NULL; END; END;",
            quote_string(&format!(
                "ALTER TABLE {} RENAME TO {}",
                self.wrap(from),
                self.wrap(to)
            )),
            guarded(
                &format!(
                    "RENAME {} TO {new_sequence}",
                    self.wrap(&sequence_name(from))
                ),
                SEQUENCE_MISSING
            ),
            quote_string(&old_trigger),
            quote_string(&format!("DROP TRIGGER \"{old_trigger}\"")),
            quote_string(&head),
            quote_string("\" IS NULL) BEGIN :NEW.\""),
            quote_string(&tail),
        )
    }

    fn compile_has_table(&self, table: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::Oracle,
            "SELECT 1 FROM USER_TABLES WHERE TABLE_NAME = ?",
            vec![Value::from(table.to_uppercase())],
        )
    }

    fn compile_has_column(&self, table: &str, column: &str) -> PolyResult<CompiledQuery> {
        CompiledQuery::raw(
            Dialect::Oracle,
            "SELECT 1 FROM USER_TAB_COLUMNS WHERE TABLE_NAME = ? AND COLUMN_NAME = ?",
            vec![
                Value::from(table.to_uppercase()),
                Value::from(column.to_uppercase()),
            ],
        )
    }
}
