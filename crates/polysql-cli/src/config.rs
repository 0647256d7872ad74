use polysql::DatabaseConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// `polysql.toml`: the database config plus the project directories.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub database: DatabaseConfig,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_seeds_dir")]
    pub seeds_dir: PathBuf,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_seeds_dir() -> PathBuf {
    PathBuf::from("seeds")
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            anyhow::anyhow!("failed to read config file {}: {e}", config_path.display())
        })?;
        let mut file = Self::parse(&raw).map_err(|e| {
            anyhow::anyhow!("failed to parse config file {}: {e}", config_path.display())
        })?;
        file.database.expand_env()?;

        Ok(Self { config_dir, file })
    }

    fn parse(raw: &str) -> Result<ConfigFile, toml::de::Error> {
        toml::from_str(raw)
    }

    /// The config file when it exists, otherwise the environment.
    pub fn resolve(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }
        let database = DatabaseConfig::from_env().map_err(|e| {
            anyhow::anyhow!(
                "{e}; provide {} or set POLYSQL_CLIENT / DATABASE_URL",
                config_path.display()
            )
        })?;
        Ok(Self {
            config_dir: PathBuf::from("."),
            file: ConfigFile {
                database,
                migrations_dir: default_migrations_dir(),
                seeds_dir: default_seeds_dir(),
            },
        })
    }

    /// Directories only; used by the `make:*` commands, which need no database.
    pub fn dirs_only(config_path: &Path) -> anyhow::Result<(PathBuf, PathBuf, PathBuf)> {
        if config_path.exists() {
            let cfg = Self::load(config_path)?;
            return Ok((
                cfg.config_dir.clone(),
                cfg.file.migrations_dir,
                cfg.file.seeds_dir,
            ));
        }
        Ok((
            PathBuf::from("."),
            default_migrations_dir(),
            default_seeds_dir(),
        ))
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        resolve_against(&self.config_dir, p)
    }
}

pub fn resolve_against(base: &Path, p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}
