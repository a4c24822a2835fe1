//! Clients for the remote services. The sync manager only talks to them through
//! [TimeEntrySource] and [WorklogTarget] so that it can be tested without network access.

pub mod jira;
pub mod tempo;
pub mod toggl;

use std::{collections::HashSet, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use tracing::error;

use crate::worklog::WorkLog;

#[cfg(test)]
use mockall::automock;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The service where time is originally tracked. Worklogs coming from it carry `master_id`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TimeEntrySource: Send + Sync {
    async fn login(&mut self) -> Result<()>;

    /// Returns entries between `start` and `end`, both days included.
    async fn detailed_report(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkLog>>;
}

/// The service worklogs are uploaded to. Worklogs coming from it carry `second_id`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorklogTarget: Send + Sync {
    async fn login(&mut self) -> Result<()>;

    /// Returns worklogs between `start` and `end`, both days included.
    async fn worklogs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkLog>>;

    /// Returns the subset of `keys` that exist as issues.
    async fn existing_issue_keys(&self, keys: &[String]) -> Result<HashSet<String>>;

    /// Uploads a worklog and returns the id it got.
    async fn add_worklog(&self, worklog: &WorkLog) -> Result<i64>;

    /// Overwrites the worklog `worklog.second_id` and returns its id.
    async fn update_worklog(&self, worklog: &WorkLog) -> Result<i64>;

    async fn delete_worklog(&self, worklog_id: i64) -> Result<()>;
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Turns a non-successful response into an error carrying the status and the body.
pub(crate) async fn ensure_success(
    response: Response,
    method_name: &str,
    url: &str,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{method_name}: url: {url} status {status}, error {body}");
    error!("{message}");
    Err(anyhow!(message))
}
