mod cli;
mod config;
mod migrate_cmd;
mod seed_cmd;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    match cli::parse_args(&args)? {
        cli::Command::Help => {
            cli::print_help();
            Ok(())
        }
        cli::Command::MakeMigration(args) => migrate_cmd::run_make(args),
        cli::Command::MigrateLatest(args) => migrate_cmd::run_latest(args).await,
        cli::Command::MigrateRollback(args) => migrate_cmd::run_rollback(args).await,
        cli::Command::MigrateStatus(args) => migrate_cmd::run_status(args).await,
        cli::Command::MakeSeed(args) => seed_cmd::run_make(args),
        cli::Command::SeedRun(args) => seed_cmd::run_seeds(args).await,
    }
}
