use crate::cli::{MakeArgs, RunArgs};
use crate::config::{ProjectConfig, resolve_against};
use crate::migrate_cmd::normalize_name;
use anyhow::Context;
use polysql::Database;

pub fn run_make(args: MakeArgs) -> anyhow::Result<()> {
    let name = normalize_name(&args.name)?;
    let dir = match args.dir {
        Some(dir) => dir,
        None => {
            let (base, _, seeds) = ProjectConfig::dirs_only(&args.config)?;
            resolve_against(&base, seeds)
        }
    };
    let path = polysql::make_seed(&dir, &name)?;
    println!("created {}", path.display());
    Ok(())
}

pub async fn run_seeds(args: RunArgs) -> anyhow::Result<()> {
    let cfg = ProjectConfig::resolve(&args.config)?;
    let dir = args
        .dir
        .unwrap_or_else(|| cfg.resolve_path(&cfg.file.seeds_dir));
    let db = Database::connect(cfg.file.database.clone())
        .with_context(|| format!("failed to set up {} connection", cfg.file.database.client))?;

    let ran = polysql::run_seeds(&db, &dir).await?;
    println!("ran {} seed file(s)", ran.len());
    for path in ran {
        println!("  {}", path.display());
    }
    Ok(())
}
