//! File-based SQL migrations.
//!
//! ```text
//! migrations/
//!   20260101090000_create_users.up.sql
//!   20260101090000_create_users.down.sql
//! ```
//!
//! Applied migrations are recorded in `polysql_migrations` (created on first
//! use through the dialect's schema grammar). Every `latest` run is one batch;
//! `rollback` undoes the most recent batch.

use crate::database::Database;
use crate::error::{PolyError, PolyResult};
use crate::executor::Executor;
use crate::schema::Schema;
use crate::statement::{Direction, Statement};
use crate::value::{Record, Row, Value};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIGRATION_TABLE: &str = "polysql_migrations";

const VERSION_DIGITS: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationFileKind {
    Up,
    Down,
}

/// Migration file pair on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskMigration {
    pub version: i64,
    pub name: String,
    pub up_path: PathBuf,
    pub down_path: Option<PathBuf>,
}

impl DiskMigration {
    /// `<version>_<name>`, the value recorded in the migration table.
    pub fn id(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }

    fn read_up(&self) -> PolyResult<String> {
        read_sql(&self.up_path)
    }
}

/// Row of the migration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: i64,
    pub name: String,
    pub batch: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub local: Vec<DiskMigration>,
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<DiskMigration>,
    pub missing_local: Vec<AppliedMigration>,
}

fn read_sql(path: &Path) -> PolyResult<String> {
    fs::read_to_string(path)
        .map_err(|e| PolyError::migration(format!("failed to read {}: {e}", path.display())))
}

fn parse_migration_filename(file_name: &str) -> Option<(i64, String, MigrationFileKind)> {
    let (stem, kind) = if let Some(stem) = file_name.strip_suffix(".up.sql") {
        (stem, MigrationFileKind::Up)
    } else {
        (file_name.strip_suffix(".down.sql")?, MigrationFileKind::Down)
    };
    let (version, name) = stem.split_once('_')?;
    if version.len() != VERSION_DIGITS
        || !version.chars().all(|c| c.is_ascii_digit())
        || name.is_empty()
    {
        return None;
    }
    Some((version.parse().ok()?, name.to_string(), kind))
}

#[derive(Debug, Default)]
struct PartialDiskMigration {
    name: String,
    up_path: Option<PathBuf>,
    down_path: Option<PathBuf>,
}

/// Scan `dir` for `<YYYYMMDDHHMMSS>_<name>.up.sql` / `.down.sql`, sorted by version.
///
/// Other files are ignored.
pub fn scan_migrations_dir(dir: impl AsRef<Path>) -> PolyResult<Vec<DiskMigration>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        PolyError::migration(format!("failed to read migrations dir {}: {e}", dir.display()))
    })?;

    let mut by_version: BTreeMap<i64, PartialDiskMigration> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            PolyError::migration(format!("failed to read entry in {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((version, name, kind)) = parse_migration_filename(file_name) else {
            continue;
        };

        let slot = by_version
            .entry(version)
            .or_insert_with(|| PartialDiskMigration {
                name: name.clone(),
                ..Default::default()
            });
        if slot.name != name {
            return Err(PolyError::migration(format!(
                "conflicting migration names for version {version}: '{}' vs '{name}'",
                slot.name
            )));
        }
        let target = match kind {
            MigrationFileKind::Up => &mut slot.up_path,
            MigrationFileKind::Down => &mut slot.down_path,
        };
        if target.is_some() {
            return Err(PolyError::migration(format!(
                "duplicate {kind:?} migration for version {version}"
            )));
        }
        *target = Some(path);
    }

    by_version
        .into_iter()
        .map(|(version, partial)| {
            let up_path = partial.up_path.ok_or_else(|| {
                PolyError::migration(format!(
                    "migration {version}_{} has a down.sql but no up.sql",
                    partial.name
                ))
            })?;
            Ok(DiskMigration {
                version,
                name: partial.name,
                up_path,
                down_path: partial.down_path,
            })
        })
        .collect()
}

fn applied_from_row(row: &Row) -> PolyResult<AppliedMigration> {
    let int = |column: &str| {
        row.get(column).and_then(Value::as_i64).ok_or_else(|| {
            PolyError::migration(format!("migration table row has no integer '{column}'"))
        })
    };
    let name = row
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| PolyError::migration("migration table row has no 'name'"))?;
    Ok(AppliedMigration {
        id: int("id")?,
        name: name.to_string(),
        batch: int("batch")?,
    })
}

async fn fetch_applied<E: Executor + ?Sized>(
    exec: &mut E,
    table: &str,
) -> PolyResult<Vec<AppliedMigration>> {
    Statement::table(table)
        .select(["id", "name", "batch"])
        .order_by("id", Direction::Asc)
        .get(exec)
        .await?
        .iter()
        .map(applied_from_row)
        .collect()
}

/// Applies and rolls back the migrations of one directory.
#[derive(Debug, Clone)]
pub struct Migrator {
    dir: PathBuf,
    table: String,
}

impl Migrator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            table: DEFAULT_MIGRATION_TABLE.to_string(),
        }
    }

    /// Use a different bookkeeping table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_table(&self, db: &Database) -> PolyResult<()> {
        let mut db = db.clone();
        let mut schema = Schema::on(&mut db);
        if schema.has_table(&self.table).await? {
            return Ok(());
        }
        tracing::info!(target: "polysql.migrate", table = %self.table, "creating migration table");
        schema
            .create_table(&self.table, |t| {
                t.increments("id");
                t.string("name", 255).not_nullable();
                t.integer("batch").not_nullable();
                t.timestamp("migration_time");
            })
            .await
    }

    /// Applied, pending and locally missing migrations.
    pub async fn status(&self, db: &Database) -> PolyResult<MigrationStatus> {
        let local = scan_migrations_dir(&self.dir)?;
        self.ensure_table(db).await?;
        let applied = fetch_applied(&mut db.clone(), &self.table).await?;

        let applied_names: HashSet<&str> = applied.iter().map(|m| m.name.as_str()).collect();
        let local_ids: HashSet<String> = local.iter().map(DiskMigration::id).collect();
        let pending = local
            .iter()
            .filter(|m| !applied_names.contains(m.id().as_str()))
            .cloned()
            .collect();
        let missing_local = applied
            .iter()
            .filter(|m| !local_ids.contains(&m.name))
            .cloned()
            .collect();

        Ok(MigrationStatus {
            local,
            applied,
            pending,
            missing_local,
        })
    }

    /// Run every pending migration as one batch inside one transaction.
    ///
    /// Returns the migrations applied, oldest first.
    pub async fn latest(&self, db: &Database) -> PolyResult<Vec<DiskMigration>> {
        let local = scan_migrations_dir(&self.dir)?;
        self.ensure_table(db).await?;
        let table = self.table.clone();

        db.transaction(move |tx| {
            Box::pin(async move {
                let applied = fetch_applied(tx, &table).await?;
                let applied_names: HashSet<String> =
                    applied.iter().map(|m| m.name.clone()).collect();
                let pending: Vec<DiskMigration> = local
                    .into_iter()
                    .filter(|m| !applied_names.contains(&m.id()))
                    .collect();
                if pending.is_empty() {
                    return Ok(pending);
                }

                let batch = applied.iter().map(|m| m.batch).max().unwrap_or(0) + 1;
                let recorder = Statement::table(&table);
                for migration in &pending {
                    let sql = migration.read_up()?;
                    if !sql.trim().is_empty() {
                        tx.execute_script(&sql).await?;
                    }
                    let row = Record::new()
                        .set("name", migration.id())
                        .set("batch", batch)
                        .set("migration_time", Utc::now().naive_utc());
                    recorder.insert(tx, &[row]).await?;
                    tracing::info!(
                        target: "polysql.migrate",
                        migration = %migration.id(),
                        batch,
                        "migration applied"
                    );
                }
                Ok(pending)
            })
        })
        .await
    }

    /// Undo the most recent batch, newest migration first, inside one transaction.
    ///
    /// A migration without a local `.down.sql` aborts the whole rollback.
    pub async fn rollback(&self, db: &Database) -> PolyResult<Vec<AppliedMigration>> {
        let local: HashMap<String, DiskMigration> = scan_migrations_dir(&self.dir)?
            .into_iter()
            .map(|m| (m.id(), m))
            .collect();
        self.ensure_table(db).await?;
        let table = self.table.clone();
        let dir = self.dir.clone();

        db.transaction(move |tx| {
            Box::pin(async move {
                let applied = fetch_applied(tx, &table).await?;
                let Some(last_batch) = applied.iter().map(|m| m.batch).max() else {
                    return Ok(Vec::new());
                };
                let mut batch: Vec<AppliedMigration> = applied
                    .into_iter()
                    .filter(|m| m.batch == last_batch)
                    .collect();
                batch.sort_by(|a, b| b.id.cmp(&a.id));

                for applied in &batch {
                    let down_path = local
                        .get(&applied.name)
                        .and_then(|m| m.down_path.as_deref())
                        .ok_or_else(|| {
                            PolyError::migration(format!(
                                "cannot roll back {}: no {}.down.sql in {}",
                                applied.name,
                                applied.name,
                                dir.display()
                            ))
                        })?;
                    let sql = read_sql(down_path)?;
                    if !sql.trim().is_empty() {
                        tx.execute_script(&sql).await?;
                    }
                    Statement::table(&table)
                        .where_eq("id", applied.id)
                        .delete(tx)
                        .await?;
                    tracing::info!(
                        target: "polysql.migrate",
                        migration = %applied.name,
                        batch = last_batch,
                        "migration rolled back"
                    );
                }
                Ok(batch)
            })
        })
        .await
    }
}

fn timestamp_version() -> PolyResult<i64> {
    Utc::now()
        .format("%Y%m%d%H%M%S")
        .to_string()
        .parse::<i64>()
        .map_err(|e| PolyError::migration(format!("failed to create migration version: {e}")))
}

pub(crate) fn check_name(name: &str) -> PolyResult<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PolyError::validation(format!(
            "invalid name '{name}': use letters, digits and '_'"
        )));
    }
    Ok(())
}

fn write_new(path: &Path, contents: &str) -> PolyResult<()> {
    if path.exists() {
        return Err(PolyError::migration(format!(
            "refusing to overwrite existing file: {}",
            path.display()
        )));
    }
    fs::write(path, contents)
        .map_err(|e| PolyError::migration(format!("failed to write {}: {e}", path.display())))
}

/// Create an empty up/down pair named `<timestamp>_<name>` in `dir`.
///
/// Returns the new migration; the version is bumped past any existing one.
pub fn make_migration(dir: impl AsRef<Path>, name: &str) -> PolyResult<DiskMigration> {
    check_name(name)?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .map_err(|e| PolyError::migration(format!("failed to create {}: {e}", dir.display())))?;

    let latest = scan_migrations_dir(dir)?
        .last()
        .map(|m| m.version)
        .unwrap_or(0);
    let version = timestamp_version()?.max(latest + 1);

    let base = format!("{version}_{name}");
    let up_path = dir.join(format!("{base}.up.sql"));
    let down_path = dir.join(format!("{base}.down.sql"));
    let created = Utc::now().format("%Y-%m-%d %H:%M:%S");
    write_new(
        &up_path,
        &format!("-- Migration: {base}\n-- Created at: {created} UTC\n\n"),
    )?;
    write_new(
        &down_path,
        &format!("-- Rollback for: {base}\n-- Created at: {created} UTC\n\n"),
    )?;

    Ok(DiskMigration {
        version,
        name: name.to_string(),
        up_path,
        down_path: Some(down_path),
    })
}

pub(crate) fn write_template(dir: &Path, file_name: &str, contents: &str) -> PolyResult<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| PolyError::migration(format!("failed to create {}: {e}", dir.display())))?;
    let path = dir.join(file_name);
    write_new(&path, contents)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "polysql-migrate-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_file_names() {
        assert_eq!(
            parse_migration_filename("20260101090000_create_users.up.sql"),
            Some((20260101090000, "create_users".into(), MigrationFileKind::Up))
        );
        assert_eq!(
            parse_migration_filename("20260101090000_create_users.down.sql"),
            Some((20260101090000, "create_users".into(), MigrationFileKind::Down))
        );
        assert_eq!(parse_migration_filename("2026_create_users.up.sql"), None);
        assert_eq!(parse_migration_filename("20260101090000_.up.sql"), None);
        assert_eq!(parse_migration_filename("20260101090000_x.sql"), None);
        assert_eq!(parse_migration_filename("README.md"), None);
    }

    #[test]
    fn scan_sorts_and_pairs() {
        let dir = temp_dir("scan");
        fs::write(dir.join("20260102000000_b.up.sql"), "").unwrap();
        fs::write(dir.join("20260101000000_a.up.sql"), "").unwrap();
        fs::write(dir.join("20260101000000_a.down.sql"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        let found = scan_migrations_dir(&dir).unwrap();
        assert_eq!(
            found.iter().map(DiskMigration::id).collect::<Vec<_>>(),
            vec!["20260101000000_a", "20260102000000_b"]
        );
        assert!(found[0].down_path.is_some());
        assert!(found[1].down_path.is_none());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn down_without_up_is_an_error() {
        let dir = temp_dir("orphan");
        fs::write(dir.join("20260101000000_a.down.sql"), "").unwrap();
        let err = scan_migrations_dir(&dir).unwrap_err();
        assert!(matches!(err, PolyError::Migration(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn make_migration_writes_pair_with_increasing_versions() {
        let dir = temp_dir("make");
        let first = make_migration(&dir, "create_users").unwrap();
        let second = make_migration(&dir, "add_email").unwrap();
        assert!(second.version > first.version);
        assert!(first.up_path.exists());
        assert!(first.down_path.as_ref().unwrap().exists());
        assert_eq!(scan_migrations_dir(&dir).unwrap().len(), 2);
        assert!(make_migration(&dir, "bad name").is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn applied_row_decoding() {
        let columns: Arc<[String]> = vec!["ID".to_string(), "NAME".into(), "BATCH".into()].into();
        let row = Row::new(
            columns,
            vec![
                Value::Text("3".into()),
                Value::from("20260101000000_a"),
                Value::Int(2),
            ],
        );
        assert_eq!(
            applied_from_row(&row).unwrap(),
            AppliedMigration {
                id: 3,
                name: "20260101000000_a".into(),
                batch: 2
            }
        );
    }
}
