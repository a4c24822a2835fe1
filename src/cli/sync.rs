use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    api::{tempo::TempoClient, toggl::TogglClient},
    config::Config,
    storage::sqlite_storage::SqliteStorage,
    sync::{
        events::EventModule, lock::SyncLock, shutdown::detect_shutdown, SyncManager,
        SyncOutcome,
    },
    utils::clock::DefaultClock,
};

use super::{output::ConsolePrinter, range::RangeArgs};

const EVENTS_BUFFER: usize = 64;

/// Processes `sync` and `load` commands. `load` only classifies worklogs and prints them.
pub async fn process_sync_command(
    app_dir: &Path,
    range: RangeArgs,
    only_load: bool,
) -> Result<()> {
    let config = Config::load(app_dir)
        .context("Configuration is missing or broken, see `config check`")?;
    config.toggl.validate()?;
    config.jira.validate()?;
    config.tempo.validate()?;

    let (start, end) = range.resolve(&DefaultClock, config.application.first_date_of_week)?;
    info!("Processing worklogs from {start} to {end}, only load: {only_load}");

    let lock = SyncLock::acquire(app_dir).await?;
    let result = run_sync(app_dir, config, start, end, only_load).await;
    lock.release().await?;

    let outcome = result?;
    if outcome.has_incomplete {
        println!("Some worklogs are incomplete and weren't synced.");
    }
    if let Some(report) = outcome.report {
        if report.failed > 0 {
            warn!("{} worklogs failed to sync", report.failed);
        }
    }
    Ok(())
}

async fn run_sync(
    app_dir: &Path,
    config: Config,
    start: NaiveDate,
    end: NaiveDate,
    only_load: bool,
) -> Result<SyncOutcome> {
    let source = TogglClient::new(config.toggl)?;
    let target = TempoClient::new(config.jira, config.tempo)?;
    let storage = SqliteStorage::open(app_dir)?;

    let (sender, receiver) = mpsc::channel(EVENTS_BUFFER);
    let shutdown = CancellationToken::new();
    let watcher = tokio::spawn(detect_shutdown(shutdown.clone()));

    let mut manager = SyncManager::new(source, target, storage, sender, shutdown);
    let printer = EventModule::new(receiver, ConsolePrinter::for_stdout());

    // The manager owns the only sender, dropping it lets the printer finish.
    let (outcome, printer) = tokio::join!(
        async move {
            let outcome = manager.sync(start, end, only_load).await;
            drop(manager);
            outcome
        },
        printer.run()
    );
    watcher.abort();

    printer?;
    outcome
}
