use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "polysql.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    MakeMigration(MakeArgs),
    MigrateLatest(RunArgs),
    MigrateRollback(RunArgs),
    MigrateStatus(RunArgs),
    MakeSeed(MakeArgs),
    SeedRun(RunArgs),
}

/// `make:migration` / `make:seed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeArgs {
    pub config: PathBuf,
    pub dir: Option<PathBuf>,
    pub name: String,
}

/// Commands that talk to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub config: PathBuf,
    pub dir: Option<PathBuf>,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(String::as_str);

    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut dir: Option<PathBuf> = None;
    let mut positional: Vec<&str> = Vec::new();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help),
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--dir" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--dir requires a value");
                };
                dir = Some(PathBuf::from(v));
            }
            _ if token.starts_with("--dir=") => {
                dir = Some(PathBuf::from(token.trim_start_matches("--dir=")));
            }
            _ if token.starts_with('-') => anyhow::bail!("unknown option: {token}"),
            _ => positional.push(token),
        }
    }

    let Some((&command, rest)) = positional.split_first() else {
        return Ok(Command::Help);
    };

    let make = |what: &str| -> anyhow::Result<MakeArgs> {
        match rest {
            [name] => Ok(MakeArgs {
                config: config.clone(),
                dir: dir.clone(),
                name: name.to_string(),
            }),
            [] => anyhow::bail!("{command} requires a {what} name"),
            _ => anyhow::bail!("{command} takes exactly one name"),
        }
    };
    let run = || -> anyhow::Result<RunArgs> {
        if let Some(extra) = rest.first() {
            anyhow::bail!("unexpected argument for {command}: {extra}");
        }
        Ok(RunArgs {
            config: config.clone(),
            dir: dir.clone(),
        })
    };

    match command {
        "make:migration" => Ok(Command::MakeMigration(make("migration")?)),
        "migrate:latest" => Ok(Command::MigrateLatest(run()?)),
        "migrate:rollback" => Ok(Command::MigrateRollback(run()?)),
        "migrate:status" => Ok(Command::MigrateStatus(run()?)),
        "make:seed" => Ok(Command::MakeSeed(make("seed")?)),
        "seed:run" => Ok(Command::SeedRun(run()?)),
        _ => anyhow::bail!("unknown command: {command}"),
    }
}

pub fn print_help() {
    println!(
        "\
polysql - migrations and seeds for Postgres, MySQL, MSSQL and Oracle

USAGE:
  polysql [OPTIONS] <COMMAND>

COMMANDS:
  make:migration <NAME>   Create an empty up/down migration pair
  migrate:latest          Run all pending migrations as one batch
  migrate:rollback        Undo the most recent batch
  migrate:status          List applied, pending and missing migrations
  make:seed <NAME>        Create an empty seed file
  seed:run                Run every seed file in name order

OPTIONS:
  --config <FILE>         Config file path (default: {DEFAULT_CONFIG})
  --dir <DIR>             Override migrations_dir / seeds_dir from config
  -h, --help              Print help

Without a config file the connection comes from POLYSQL_CLIENT and DATABASE_URL."
    );
}
