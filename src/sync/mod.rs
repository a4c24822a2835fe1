//! Synchronization of time tracker entries into Tempo.
//!
//! A run loads both sides for a date range, classifies every time tracker worklog with
//! [reconcile::calculate_worklogs_statuses] and then applies the minimal set of Tempo calls:
//! new worklogs are added, updated ones are overwritten, moved ones are deleted and added again.
//! The correspondence table in [SyncKeyStorage] is kept in step with every successful call.

pub mod events;
pub mod lock;
pub mod reconcile;
pub mod shutdown;

use std::fmt::Display;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use events::SyncEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{
    api::{TimeEntrySource, WorklogTarget},
    storage::SyncKeyStorage,
    worklog::{WorkLog, WorkLogState},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The run was interrupted before every worklog was processed.
    pub cancelled: bool,
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.total;
        write!(
            f,
            "Result: added {}/{total}, updated {}/{total}, skipped {}/{total}, failed: {}/{total}.",
            self.added, self.updated, self.skipped, self.failed
        )?;
        if self.cancelled {
            write!(f, " Interrupted.")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub worklogs: Vec<WorkLog>,
    pub has_incomplete: bool,
    /// Missing for load-only runs.
    pub report: Option<SyncReport>,
}

pub struct SyncManager<S, T, K> {
    source: S,
    target: T,
    storage: K,
    events: mpsc::Sender<SyncEvent>,
    shutdown: CancellationToken,
}

impl<S: TimeEntrySource, T: WorklogTarget, K: SyncKeyStorage> SyncManager<S, T, K> {
    pub fn new(
        source: S,
        target: T,
        storage: K,
        events: mpsc::Sender<SyncEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            storage,
            events,
            shutdown,
        }
    }

    /// Loads and classifies worklogs between `start_date` and `end_date`. Unless `only_load` is
    /// set, the differences are then pushed to Tempo.
    #[instrument(skip(self))]
    pub async fn sync(
        &mut self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        only_load: bool,
    ) -> Result<SyncOutcome> {
        self.login().await?;

        let loaded = self.load(start_date, end_date).await;
        let (mut worklogs, has_incomplete) = match loaded {
            Ok(v) => v,
            Err(e) => {
                self.sync_error(&e).await;
                return Err(e);
            }
        };

        self.publish(SyncEvent::Worklogs(worklogs.clone())).await;

        if only_load {
            self.status("Load completed.").await;
            return Ok(SyncOutcome {
                worklogs,
                has_incomplete,
                report: None,
            });
        }

        let report = self.sync_impl(&mut worklogs).await?;
        Ok(SyncOutcome {
            worklogs,
            has_incomplete,
            report: Some(report),
        })
    }

    async fn login(&mut self) -> Result<()> {
        self.status("Toggl authentication...").await;
        let toggl = self.source.login().await;
        if let Err(e) = toggl {
            return self.authentication_failed(e).await;
        }

        self.status("JIRA authentication...").await;
        let jira = self.target.login().await;
        if let Err(e) = jira {
            return self.authentication_failed(e).await;
        }
        Ok(())
    }

    async fn authentication_failed(&self, e: anyhow::Error) -> Result<()> {
        error!("Authentication failed {e:?}");
        self.status("Sorry, authentication failed. Please check log for more details.")
            .await;
        Err(e.context("Authentication failed"))
    }

    async fn load(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(Vec<WorkLog>, bool)> {
        self.status("Load worklogs from Tempo...").await;
        let tempo_worklogs = self.target.worklogs(start_date, end_date).await?;

        self.status("Load worklogs from Toggl...").await;
        let mut toggl_worklogs = self.source.detailed_report(start_date, end_date).await?;
        info!(
            "Loaded {} Toggl and {} Tempo worklogs",
            toggl_worklogs.len(),
            tempo_worklogs.len()
        );

        let mut has_incomplete = reconcile::calculate_worklogs_statuses(
            &mut toggl_worklogs,
            &tempo_worklogs,
            &self.storage,
        )?;

        has_incomplete |= self.verify_issue_keys(&mut toggl_worklogs).await;

        Ok((toggl_worklogs, has_incomplete))
    }

    /// Worklogs pointing to issues that don't exist are excluded from the upload. Failing to
    /// check isn't fatal, Tempo rejects such worklogs anyway.
    async fn verify_issue_keys(&self, worklogs: &mut [WorkLog]) -> bool {
        let keys = reconcile::keys_to_verify(worklogs);
        if keys.is_empty() {
            return false;
        }

        self.status("Check issues in JIRA...").await;
        match self.target.existing_issue_keys(&keys).await {
            Ok(existing) => {
                let marked = reconcile::mark_unknown_issues(worklogs, &existing);
                if marked > 0 {
                    warn!("{marked} worklogs reference unknown issues");
                }
                marked > 0
            }
            Err(e) => {
                warn!("Can't check issue keys {e:?}");
                false
            }
        }
    }

    async fn sync_impl(&self, worklogs: &mut [WorkLog]) -> Result<SyncReport> {
        self.status("Sync in process...").await;

        let mut report = SyncReport {
            total: worklogs.len(),
            ..Default::default()
        };

        for (progress_counter, wl) in worklogs.iter_mut().enumerate() {
            if self.shutdown.is_cancelled() {
                report.cancelled = true;
                break;
            }

            self.status(format!(
                "Progress: syncing {progress_counter}/{}",
                report.total
            ))
            .await;

            let result = match wl.state {
                WorkLogState::New => self.add(wl).await,
                WorkLogState::Moved => self.recreate(wl).await,
                WorkLogState::Updated => self.update(wl).await,
                WorkLogState::Unknown | WorkLogState::Incomplete | WorkLogState::Synced => {
                    report.skipped += 1;
                    continue;
                }
            };

            let succeeded = match result {
                Ok(v) => v,
                Err(e) => {
                    report.failed += 1;
                    self.status(report.to_string()).await;
                    self.sync_error(&e).await;
                    return Err(e);
                }
            };

            match (succeeded, wl.state) {
                (false, _) => report.failed += 1,
                (true, WorkLogState::New) => report.added += 1,
                (true, _) => report.updated += 1,
            }
        }

        info!("{report}");
        self.status(report.to_string()).await;
        Ok(report)
    }

    /// Remote failures are logged and reported as `false`. Storage failures abort the run since
    /// the table would no longer match Tempo.
    async fn add(&self, wl: &mut WorkLog) -> Result<bool> {
        match self.target.add_worklog(wl).await {
            Ok(second_id) => {
                wl.second_id = Some(second_id);
                self.storage
                    .add(wl)
                    .with_context(|| format!("Can't store uploaded worklog {second_id}"))?;
                Ok(true)
            }
            Err(e) => {
                error!("Failed to add worklog {:?}: {e:?}", wl.master_id);
                Ok(false)
            }
        }
    }

    async fn recreate(&self, wl: &mut WorkLog) -> Result<bool> {
        let (Some(master_id), Some(second_id)) = (wl.master_id, wl.second_id) else {
            error!("Moved worklog {:?} has no Tempo counterpart", wl.master_id);
            return Ok(false);
        };

        if let Err(e) = self.target.delete_worklog(second_id).await {
            error!("Failed to delete worklog {second_id}: {e:?}");
            return Ok(false);
        }

        self.storage.delete(master_id, second_id)?;
        wl.second_id = None;

        self.add(wl).await
    }

    async fn update(&self, wl: &mut WorkLog) -> Result<bool> {
        let (Some(master_id), Some(previous_id)) = (wl.master_id, wl.second_id) else {
            error!("Updated worklog {:?} has no Tempo counterpart", wl.master_id);
            return Ok(false);
        };

        match self.target.update_worklog(wl).await {
            Ok(second_id) => {
                if second_id != previous_id {
                    self.storage.delete(master_id, previous_id)?;
                    wl.second_id = Some(second_id);
                    self.storage.add(wl)?;
                }
                Ok(true)
            }
            Err(e) => {
                error!("Failed to update worklog {previous_id}: {e:?}");
                Ok(false)
            }
        }
    }

    async fn sync_error(&self, e: &anyhow::Error) {
        let message = format!("Sync error occurred: {e}.");
        error!("{message}");
        self.status(message).await;
    }

    async fn status(&self, message: impl Into<String>) {
        self.publish(SyncEvent::Status(message.into())).await;
    }

    async fn publish(&self, event: SyncEvent) {
        if let Err(e) = self.events.send(event).await {
            warn!("Nobody listens to sync events {e}");
        }
    }
}
