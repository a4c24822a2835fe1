pub mod config;
pub mod forget;
pub mod output;
pub mod range;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{process_config_command, ConfigCommand};
use forget::{forget, ForgetCommand};
use range::RangeArgs;
use sync::process_sync_command;
use tracing::level_filters::LevelFilter;

use crate::{
    import::{self, SourceValidation},
    storage::sqlite_storage::SqliteStorage,
    utils::{
        dir::{application_default_path, ensure_dir},
        logging::{enable_logging, LoggingOptions},
    },
};

#[derive(Parser, Debug)]
#[command(name = "toggl2tempo", version, long_about = None)]
#[command(about = "Synchronizes Toggl time entries into Tempo worklogs", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Mirror logs into the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Logging level, overrides RUST_LOG. For example \"info\" or \"trace\""
    )]
    log_filter: Option<LevelFilter>,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses %APPDATA%, $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Upload new and changed Toggl time entries into Tempo")]
    Sync {
        #[command(flatten)]
        range: RangeArgs,
    },
    #[command(about = "Show what sync would do without changing anything")]
    Load {
        #[command(flatten)]
        range: RangeArgs,
    },
    #[command(about = "Import configuration and sync database from another directory")]
    Import {
        #[arg(help = "Directory containing app-config.json and toggl-sync.db")]
        source: PathBuf,
        #[arg(long, help = "Overwrite existing configuration")]
        force: bool,
    },
    #[command(about = "Show or change configuration")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    #[command(
        about = "Forget the link between a Toggl entry and a Tempo worklog. The entry is uploaded again on the next sync"
    )]
    Forget {
        #[command(flatten)]
        command: ForgetCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => application_default_path()?,
    };

    enable_logging(LoggingOptions {
        logs_dir: app_dir.join("logs"),
        level: args.log_filter,
        console: args.log,
    })?;

    match args.commands {
        Commands::Sync { range } => process_sync_command(&app_dir, range, false).await,
        Commands::Load { range } => process_sync_command(&app_dir, range, true).await,
        Commands::Import { source, force } => process_import_command(&source, &app_dir, force),
        Commands::Config { command } => process_config_command(&app_dir, command),
        Commands::Forget { command } => {
            let storage = SqliteStorage::open(&app_dir)?;
            match forget(&storage, command)? {
                Some((toggl_id, tempo_id)) => {
                    println!("Forgot Toggl entry {toggl_id} linked to Tempo worklog {tempo_id}.")
                }
                None => println!("No such link."),
            }
            Ok(())
        }
    }
}

fn process_import_command(source: &Path, app_dir: &Path, force: bool) -> Result<()> {
    match import::validate(source) {
        SourceValidation::Valid => (),
        SourceValidation::Invalid(Some(message)) => anyhow::bail!("{message}"),
        SourceValidation::Invalid(None) => anyhow::bail!("The directory isn't specified."),
    }

    if import::configuration_exists(app_dir) && !force {
        anyhow::bail!(
            "Configuration already exists in {}. Use --force to overwrite it",
            app_dir.display()
        );
    }

    import::import_artifacts(source, app_dir)?;
    println!("Configuration imported into {}.", app_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use clap::Parser;
    use tempfile::tempdir;
    use tracing::level_filters::LevelFilter;

    use crate::{config::Config, storage::sqlite_storage::SqliteStorage};

    use super::{process_import_command, Args, Commands};

    #[test]
    fn logging_flags_are_accepted_after_subcommand() -> Result<()> {
        let args = Args::try_parse_from([
            "toggl2tempo",
            "sync",
            "--week",
            "--log",
            "--log-filter",
            "info",
            "--dir",
            "/tmp/toggl2tempo",
        ])?;

        assert!(args.log);
        assert_eq!(args.log_filter, Some(LevelFilter::INFO));
        assert_eq!(args.dir.as_deref(), Some(Path::new("/tmp/toggl2tempo")));
        assert!(matches!(args.commands, Commands::Sync { .. }));
        Ok(())
    }

    #[test]
    fn import_without_directory_is_rejected() -> Result<()> {
        let app_dir = tempdir()?;

        let error = process_import_command(Path::new(""), app_dir.path(), false).unwrap_err();

        assert_eq!(error.to_string(), "The directory isn't specified.");
        Ok(())
    }

    #[test]
    fn import_refuses_to_overwrite_without_force() -> Result<()> {
        let source = tempdir()?;
        let mut config = Config::default();
        config.toggl.token = "imported".into();
        config.save(source.path())?;
        SqliteStorage::open(source.path())?;

        let app_dir = tempdir()?;
        Config::default().save(app_dir.path())?;

        assert!(process_import_command(source.path(), app_dir.path(), false).is_err());
        assert_eq!(Config::load(app_dir.path())?.toggl.token, "");

        process_import_command(source.path(), app_dir.path(), true)?;
        assert_eq!(Config::load(app_dir.path())?.toggl.token, "imported");
        Ok(())
    }

    #[test]
    fn import_rejects_invalid_source() -> Result<()> {
        let source = tempdir()?;
        let app_dir = tempdir()?;

        let error = process_import_command(source.path(), app_dir.path(), false).unwrap_err();

        assert!(error
            .to_string()
            .starts_with("The directory should contain two files"));
        Ok(())
    }
}
