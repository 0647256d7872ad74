//! Seed files: plain `*.sql` scripts run in file-name order.

use crate::database::Database;
use crate::error::{PolyError, PolyResult};
use crate::executor::Executor;
use crate::migrate::{check_name, write_template};
use std::fs;
use std::path::{Path, PathBuf};

/// `*.sql` files directly under `dir`, sorted by file name.
pub fn scan_seeds_dir(dir: impl AsRef<Path>) -> PolyResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        PolyError::migration(format!("failed to read seeds dir {}: {e}", dir.display()))
    })?;
    let mut seeds = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| {
                PolyError::migration(format!("failed to read entry in {}: {e}", dir.display()))
            })?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            seeds.push(path);
        }
    }
    seeds.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(seeds)
}

/// Create an empty `<name>.sql` seed in `dir`.
pub fn make_seed(dir: impl AsRef<Path>, name: &str) -> PolyResult<PathBuf> {
    check_name(name)?;
    write_template(
        dir.as_ref(),
        &format!("{name}.sql"),
        &format!("-- Seed: {name}\n\n"),
    )
}

/// Run every seed in `dir` inside one transaction; returns the files run.
pub async fn run_seeds(db: &Database, dir: impl AsRef<Path>) -> PolyResult<Vec<PathBuf>> {
    let seeds = scan_seeds_dir(dir)?;
    let scripts = seeds
        .iter()
        .map(|path| {
            fs::read_to_string(path)
                .map(|sql| (path.clone(), sql))
                .map_err(|e| {
                    PolyError::migration(format!("failed to read {}: {e}", path.display()))
                })
        })
        .collect::<PolyResult<Vec<_>>>()?;

    db.transaction(move |tx| {
        Box::pin(async move {
            for (path, sql) in &scripts {
                if sql.trim().is_empty() {
                    continue;
                }
                tx.execute_script(sql).await?;
                tracing::info!(target: "polysql.migrate", seed = %path.display(), "seed executed");
            }
            Ok(())
        })
    })
    .await?;
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_sorted_by_file_name() {
        let dir = std::env::temp_dir().join(format!("polysql-seeds-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        make_seed(&dir, "02_posts").unwrap();
        make_seed(&dir, "01_users").unwrap();
        fs::write(dir.join("readme.md"), "").unwrap();

        let names: Vec<_> = scan_seeds_dir(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01_users.sql", "02_posts.sql"]);
        assert!(make_seed(&dir, "01_users").is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
