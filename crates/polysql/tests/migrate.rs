mod common;

use common::{Recorder, row};
use polysql::{Dialect, DriverError, Migrator, PolyError, Value, run_seeds};
use std::fs;
use std::path::PathBuf;

const APPLIED: &str = "FROM \"polysql_migrations\" ORDER BY";

fn migrations_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("polysql-it-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("20260101000000_create_users.up.sql"),
        "CREATE TABLE users (id serial primary key)",
    )
    .unwrap();
    fs::write(
        dir.join("20260101000000_create_users.down.sql"),
        "DROP TABLE users",
    )
    .unwrap();
    fs::write(
        dir.join("20260102000000_create_posts.up.sql"),
        "CREATE TABLE posts (id serial primary key)",
    )
    .unwrap();
    fs::write(
        dir.join("20260102000000_create_posts.down.sql"),
        "DROP TABLE posts",
    )
    .unwrap();
    dir
}

fn applied_row(id: i64, name: &str, batch: i64) -> polysql::Row {
    row(
        &["id", "name", "batch"],
        vec![Value::Int(id), Value::from(name), Value::Int(batch)],
    )
}

fn table_exists(rec: &Recorder) {
    rec.respond("information_schema.tables", vec![row(&["?column?"], vec![Value::Int(1)])]);
}

#[tokio::test]
async fn latest_applies_pending_in_one_batch() {
    let dir = migrations_dir("latest");
    let rec = Recorder::new();
    table_exists(&rec);
    let db = rec.database(Dialect::Postgres);

    let applied = Migrator::new(&dir).latest(&db).await.unwrap();

    assert_eq!(
        applied.iter().map(|m| m.id()).collect::<Vec<_>>(),
        vec!["20260101000000_create_users", "20260102000000_create_posts"]
    );
    let sqls = rec.sqls();
    assert!(sqls[0].contains("information_schema.tables"));
    assert_eq!(sqls[1], "BEGIN");
    assert!(sqls[2].contains(APPLIED));
    assert_eq!(sqls[3], "CREATE TABLE users (id serial primary key)");
    assert_eq!(
        sqls[4],
        "INSERT INTO \"polysql_migrations\" (\"name\", \"batch\", \"migration_time\") VALUES ($1, $2, $3)"
    );
    assert_eq!(sqls[5], "CREATE TABLE posts (id serial primary key)");
    assert_eq!(sqls.last().map(String::as_str), Some("COMMIT"));

    let insert = &rec.entries()[4];
    assert_eq!(insert.bindings[0], Value::from("20260101000000_create_users"));
    assert_eq!(insert.bindings[1], Value::Int(1));
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn latest_skips_applied_and_bumps_batch() {
    let dir = migrations_dir("skip");
    let rec = Recorder::new();
    table_exists(&rec);
    rec.respond(APPLIED, vec![applied_row(1, "20260101000000_create_users", 1)]);
    let db = rec.database(Dialect::Postgres);

    let applied = Migrator::new(&dir).latest(&db).await.unwrap();

    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].name, "create_posts");
    let inserts: Vec<_> = rec
        .entries()
        .into_iter()
        .filter(|e| e.sql.starts_with("INSERT"))
        .collect();
    assert_eq!(inserts.len(), 1);
    assert_eq!(inserts[0].bindings[1], Value::Int(2));
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn failing_migration_rolls_back_the_batch() {
    let dir = migrations_dir("fail");
    let rec = Recorder::new();
    table_exists(&rec);
    rec.fail_on(
        "CREATE TABLE posts",
        DriverError::execute("relation \"posts\" already exists").with_code("42P07"),
    );
    let db = rec.database(Dialect::Postgres);

    let err = Migrator::new(&dir).latest(&db).await.unwrap_err();

    assert!(matches!(err, PolyError::Query { .. }));
    let sqls = rec.sqls();
    assert_eq!(sqls.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!sqls.iter().any(|s| s == "COMMIT"));
    assert_eq!(rec.acquired(), rec.released());
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn missing_table_is_created_through_schema_grammar() {
    let dir = migrations_dir("create");
    let rec = Recorder::new();
    let db = rec.database(Dialect::Oracle);

    Migrator::new(&dir).latest(&db).await.unwrap();

    let sqls = rec.sqls();
    assert!(sqls[0].contains("USER_TABLES"));
    assert!(sqls[1].starts_with("CREATE TABLE \"POLYSQL_MIGRATIONS\""));
    assert_eq!(sqls[2], "CREATE SEQUENCE \"POLYSQL_MIGRATIONS_SEQ\"");
    assert!(sqls[3].starts_with("CREATE OR REPLACE TRIGGER"));
    assert_eq!(sqls[4], "SET TRANSACTION READ WRITE");
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn rollback_undoes_last_batch_newest_first() {
    let dir = migrations_dir("rollback");
    fs::write(dir.join("20260103000000_add_email.up.sql"), "ALTER TABLE users ADD email text").unwrap();
    fs::write(dir.join("20260103000000_add_email.down.sql"), "ALTER TABLE users DROP email").unwrap();
    let rec = Recorder::new();
    table_exists(&rec);
    rec.respond(
        APPLIED,
        vec![
            applied_row(1, "20260101000000_create_users", 1),
            applied_row(2, "20260102000000_create_posts", 2),
            applied_row(3, "20260103000000_add_email", 2),
        ],
    );
    let db = rec.database(Dialect::Postgres);

    let undone = Migrator::new(&dir).rollback(&db).await.unwrap();

    assert_eq!(undone.iter().map(|m| m.id).collect::<Vec<_>>(), vec![3, 2]);
    let entries = rec.entries();
    let tail: Vec<_> = entries.iter().skip(3).map(|e| e.sql.as_str()).collect();
    assert_eq!(
        tail,
        vec![
            "ALTER TABLE users DROP email",
            "DELETE FROM \"polysql_migrations\" WHERE \"id\" = $1",
            "DROP TABLE posts",
            "DELETE FROM \"polysql_migrations\" WHERE \"id\" = $1",
            "COMMIT",
        ]
    );
    assert_eq!(entries[4].bindings, vec![Value::Int(3)]);
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn rollback_without_down_file_fails() {
    let dir = migrations_dir("nodown");
    fs::remove_file(dir.join("20260102000000_create_posts.down.sql")).unwrap();
    let rec = Recorder::new();
    table_exists(&rec);
    rec.respond(APPLIED, vec![applied_row(2, "20260102000000_create_posts", 1)]);
    let db = rec.database(Dialect::Postgres);

    let err = Migrator::new(&dir).rollback(&db).await.unwrap_err();

    assert!(matches!(err, PolyError::Migration(_)));
    assert_eq!(rec.sqls().last().map(String::as_str), Some("ROLLBACK"));
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn status_reports_pending_and_missing() {
    let dir = migrations_dir("status");
    let rec = Recorder::new();
    table_exists(&rec);
    rec.respond(
        APPLIED,
        vec![
            applied_row(1, "20260101000000_create_users", 1),
            applied_row(2, "20251231000000_legacy", 1),
        ],
    );
    let db = rec.database(Dialect::Postgres);

    let status = Migrator::new(&dir).status(&db).await.unwrap();

    assert_eq!(status.local.len(), 2);
    assert_eq!(status.applied.len(), 2);
    assert_eq!(status.pending.len(), 1);
    assert_eq!(status.pending[0].name, "create_posts");
    assert_eq!(status.missing_local.len(), 1);
    assert_eq!(status.missing_local[0].name, "20251231000000_legacy");
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn seeds_run_in_file_order_in_one_transaction() {
    let dir = std::env::temp_dir().join(format!("polysql-it-seeds-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("02_posts.sql"), "INSERT INTO posts VALUES (1)").unwrap();
    fs::write(dir.join("01_users.sql"), "INSERT INTO users VALUES (1)").unwrap();
    fs::write(dir.join("00_empty.sql"), "  \n").unwrap();
    let rec = Recorder::new();
    let db = rec.database(Dialect::MySql);

    let ran = run_seeds(&db, &dir).await.unwrap();

    assert_eq!(ran.len(), 3);
    assert_eq!(
        rec.sqls(),
        vec![
            "START TRANSACTION",
            "INSERT INTO users VALUES (1)",
            "INSERT INTO posts VALUES (1)",
            "COMMIT"
        ]
    );
    fs::remove_dir_all(&dir).unwrap();
}
