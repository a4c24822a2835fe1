use std::{collections::HashSet, future::Future};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    config::{JiraConfig, TempoConfig},
    utils::time::format_api_date,
    worklog::WorkLog,
};

use super::{ensure_success, http_client, jira::JiraClient, WorklogTarget};

const PAGE_SIZE: i64 = 50;
const ACTIVITY_ATTRIBUTE: &str = "_Activity_";

#[derive(Debug, Deserialize)]
struct WorklogPage {
    metadata: PageMetadata,
    results: Vec<TempoWorklogRecord>,
}

#[derive(Debug, Deserialize)]
struct PageMetadata {
    count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TempoWorklogRecord {
    tempo_worklog_id: i64,
    issue: IssueRef,
    description: Option<String>,
    time_spent_seconds: i64,
    start_date: NaiveDate,
    start_time: NaiveTime,
    #[serde(default)]
    attributes: Option<Attributes>,
}

#[derive(Debug, Deserialize)]
struct IssueRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct Attributes {
    #[serde(default)]
    values: Vec<AttributeValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttributeValue {
    key: String,
    value: String,
}

impl From<TempoWorklogRecord> for WorkLog {
    fn from(record: TempoWorklogRecord) -> Self {
        let start = record.start_date.and_time(record.start_time);
        let end = start + Duration::seconds(record.time_spent_seconds);

        let mut wl = WorkLog::new(start, end, record.time_spent_seconds);
        wl.second_id = Some(record.tempo_worklog_id);
        wl.key = Some(record.issue.key);
        wl.description = record.description;
        wl.activity = record
            .attributes
            .into_iter()
            .flat_map(|attributes| attributes.values)
            .find(|attribute| attribute.key == ACTIVITY_ATTRIBUTE)
            .map(|attribute| decode_attribute(&attribute.value));
        wl
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogPayload<'a> {
    issue_key: &'a str,
    time_spent_seconds: i64,
    start_date: String,
    start_time: String,
    description: &'a str,
    author_account_id: &'a str,
    attributes: Vec<AttributeValue>,
}

impl<'a> WorklogPayload<'a> {
    fn new(worklog: &'a WorkLog, author_account_id: &'a str) -> Result<Self> {
        let issue_key = worklog
            .key
            .as_deref()
            .ok_or_else(|| anyhow!("Worklog {:?} has no issue key", worklog.master_id))?;
        let activity = worklog
            .activity
            .as_deref()
            .ok_or_else(|| anyhow!("Worklog {:?} has no activity", worklog.master_id))?;

        Ok(Self {
            issue_key,
            time_spent_seconds: worklog.duration,
            start_date: format_api_date(worklog.start.date()),
            start_time: worklog.start.format("%H:%M:00").to_string(),
            description: worklog.description.as_deref().unwrap_or_default(),
            author_account_id,
            attributes: vec![AttributeValue {
                key: ACTIVITY_ATTRIBUTE.into(),
                // Tempo still requires attribute values to be encoded.
                value: urlencoding::encode(activity).into_owned(),
            }],
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorklogAnswer {
    tempo_worklog_id: i64,
}

fn decode_attribute(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|e| {
            warn!("Can't decode attribute value {value:?}: {e}");
            value.to_string()
        })
}

/// Requests pages of [PAGE_SIZE] worklogs by offset until a page comes back short.
async fn load_worklog_pages<F, Fut>(mut load_page: F) -> Result<Vec<TempoWorklogRecord>>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<WorklogPage>>,
{
    let mut records = vec![];
    let mut offset = 0;
    loop {
        let page = load_page(offset).await?;
        debug!("Loaded Tempo page at {offset} with {} worklogs", page.metadata.count);

        records.extend(page.results);
        offset += PAGE_SIZE;

        if page.metadata.count < PAGE_SIZE {
            break;
        }
    }
    Ok(records)
}

pub struct TempoClient {
    jira: JiraClient,
    config: TempoConfig,
    http: Client,
}

impl TempoClient {
    pub fn new(jira_config: JiraConfig, tempo_config: TempoConfig) -> Result<Self> {
        Ok(Self {
            jira: JiraClient::new(jira_config)?,
            config: tempo_config,
            http: http_client()?,
        })
    }

    fn api_url(&self, relative_url: &str) -> String {
        format!(
            "{}/3/{relative_url}",
            self.config.url.trim_end_matches('/')
        )
    }

    fn account_id(&self) -> Result<&str> {
        self.jira
            .user()
            .map(|user| user.account_id.as_str())
            .ok_or_else(|| anyhow!("Not logged in to JIRA"))
    }

    async fn worklogs_page(
        &self,
        url: &str,
        start: NaiveDate,
        end: NaiveDate,
        offset: i64,
    ) -> Result<WorklogPage> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .query(&[
                ("from", format_api_date(start)),
                ("to", format_api_date(end)),
                ("offset", offset.to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ])
            .send()
            .await?;
        Ok(ensure_success(response, "get_worklogs", url)
            .await?
            .json()
            .await?)
    }

    async fn send_worklog(
        &self,
        request: reqwest::RequestBuilder,
        worklog: &WorkLog,
        method_name: &str,
        url: &str,
    ) -> Result<i64> {
        let payload = WorklogPayload::new(worklog, self.account_id()?)?;
        let response = request
            .bearer_auth(&self.config.token)
            .json(&payload)
            .send()
            .await?;
        let answer: WorklogAnswer = ensure_success(response, method_name, url)
            .await?
            .json()
            .await?;
        Ok(answer.tempo_worklog_id)
    }
}

#[async_trait]
impl WorklogTarget for TempoClient {
    async fn login(&mut self) -> Result<()> {
        self.config.validate()?;
        self.jira.login().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn worklogs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkLog>> {
        let url = self.api_url(&format!("worklogs/user/{}", self.account_id()?));

        let records =
            load_worklog_pages(|offset| self.worklogs_page(&url, start, end, offset)).await?;

        Ok(records.into_iter().map(WorkLog::from).collect())
    }

    async fn existing_issue_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        let issues = self.jira.find_issues(keys).await?;
        Ok(issues.into_iter().map(|issue| issue.key).collect())
    }

    async fn add_worklog(&self, worklog: &WorkLog) -> Result<i64> {
        let url = self.api_url("worklogs");
        self.send_worklog(self.http.post(&url), worklog, "add_worklog", &url)
            .await
    }

    async fn update_worklog(&self, worklog: &WorkLog) -> Result<i64> {
        let worklog_id = worklog
            .second_id
            .ok_or_else(|| anyhow!("Worklog {:?} was never uploaded", worklog.master_id))?;
        let url = self.api_url(&format!("worklogs/{worklog_id}"));
        self.send_worklog(self.http.put(&url), worklog, "update_worklog", &url)
            .await
    }

    async fn delete_worklog(&self, worklog_id: i64) -> Result<()> {
        let url = self.api_url(&format!("worklogs/{worklog_id}"));
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        ensure_success(response, "delete_worklog", &url).await?;
        Ok(())
    }
}
