use crate::cli::{MakeArgs, RunArgs};
use crate::config::{ProjectConfig, resolve_against};
use anyhow::Context;
use heck::ToSnakeCase;
use polysql::{Database, Migrator};
use std::path::PathBuf;

/// Snake-case `name` and squeeze everything else into single underscores.
pub(crate) fn normalize_name(name: &str) -> anyhow::Result<String> {
    let mut s = name
        .to_snake_case()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    while s.contains("__") {
        s = s.replace("__", "_");
    }
    let s = s.trim_matches('_').to_string();
    if s.is_empty() {
        anyhow::bail!("name becomes empty after normalization: {name:?}");
    }
    Ok(s)
}

fn migrations_dir(cfg: &ProjectConfig, dir: Option<PathBuf>) -> PathBuf {
    match dir {
        Some(dir) => dir,
        None => cfg.resolve_path(&cfg.file.migrations_dir),
    }
}

fn connect(args: RunArgs) -> anyhow::Result<(Database, Migrator)> {
    let cfg = ProjectConfig::resolve(&args.config)?;
    let dir = migrations_dir(&cfg, args.dir);
    tracing::debug!(
        client = %cfg.file.database.client,
        dir = %dir.display(),
        "resolved project config"
    );
    let db = Database::connect(cfg.file.database.clone())
        .with_context(|| format!("failed to set up {} connection", cfg.file.database.client))?;
    Ok((db, Migrator::new(dir)))
}

pub fn run_make(args: MakeArgs) -> anyhow::Result<()> {
    let name = normalize_name(&args.name)?;
    let dir = match args.dir {
        Some(dir) => dir,
        None => {
            let (base, migrations, _) = ProjectConfig::dirs_only(&args.config)?;
            resolve_against(&base, migrations)
        }
    };
    let migration = polysql::make_migration(&dir, &name)?;
    println!("created {}", migration.up_path.display());
    if let Some(down) = &migration.down_path {
        println!("created {}", down.display());
    }
    Ok(())
}

pub async fn run_latest(args: RunArgs) -> anyhow::Result<()> {
    let (db, migrator) = connect(args)?;
    let applied = migrator.latest(&db).await?;
    if applied.is_empty() {
        println!("already up to date");
        return Ok(());
    }
    println!("applied {} migration(s)", applied.len());
    for m in applied {
        println!("  {}", m.id());
    }
    Ok(())
}

pub async fn run_rollback(args: RunArgs) -> anyhow::Result<()> {
    let (db, migrator) = connect(args)?;
    let rolled_back = migrator.rollback(&db).await?;
    if rolled_back.is_empty() {
        println!("no migrations to roll back");
        return Ok(());
    }
    println!(
        "rolled back batch {} ({} migration(s))",
        rolled_back[0].batch,
        rolled_back.len()
    );
    for m in rolled_back {
        println!("  {}", m.name);
    }
    Ok(())
}

pub async fn run_status(args: RunArgs) -> anyhow::Result<()> {
    let (db, migrator) = connect(args)?;
    let status = migrator.status(&db).await?;

    println!("migrations dir: {}", migrator.dir().display());
    println!("applied: {}", status.applied.len());
    for m in &status.applied {
        println!("  [batch {}] {}", m.batch, m.name);
    }
    println!("pending: {}", status.pending.len());
    for m in &status.pending {
        println!("  {}", m.id());
    }
    if !status.missing_local.is_empty() {
        println!("missing locally: {}", status.missing_local.len());
        for m in &status.missing_local {
            println!("  {}", m.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_cased() {
        assert_eq!(normalize_name("CreateUsers").unwrap(), "create_users");
        assert_eq!(normalize_name("add email-index").unwrap(), "add_email_index");
        assert!(normalize_name("--").is_err());
    }
}
