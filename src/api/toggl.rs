use std::{future::Future, sync::LazyLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::{
    config::TogglConfig,
    utils::time::{period_since, period_until, truncate_to_minute},
    worklog::WorkLog,
};

use super::{ensure_success, http_client, TimeEntrySource};

static ISSUE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+-\d+").expect("Issue key regex is valid"));

const KEY_TAG_PREFIX: &str = "key_";

/// Toggl project names mapped onto Tempo activities. Unknown projects become [FALLBACK_ACTIVITY].
const PROJECTS_TO_ACTIVITIES: [(&str, &str); 11] = [
    ("Analysis", "Design/Analysis"),
    ("BugFixing", "Bugfixing"),
    ("CodeReview", "Code Review"),
    ("CR Fixes", "Code Review Fixes"),
    ("Development", "Development"),
    ("Estimation", "Estimation"),
    ("Interview", "Other"),
    ("Meetings", "Other"),
    ("Testing", "Testing"),
    ("Environment Setup", "Environment Setup"),
    ("Team Activities", "Other"),
];

const FALLBACK_ACTIVITY: &str = "Other";

#[derive(Debug, Deserialize)]
struct Workspace {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct DetailedReportPage {
    per_page: i64,
    total_count: i64,
    data: Vec<TimeEntryRecord>,
}

#[derive(Debug, Deserialize)]
struct TimeEntryRecord {
    id: i64,
    project: Option<String>,
    description: Option<String>,
    start: DateTime<FixedOffset>,
    end: Option<DateTime<FixedOffset>>,
    /// Milliseconds.
    dur: i64,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<TimeEntryRecord> for WorkLog {
    fn from(record: TimeEntryRecord) -> Self {
        let duration = record.dur / 1000;
        let start = truncate_to_minute(record.start.naive_local());
        let end = record
            .end
            .map(|v| truncate_to_minute(v.naive_local()))
            .unwrap_or_else(|| start + Duration::seconds(duration));

        let mut wl = WorkLog::new(start, end, duration);
        wl.master_id = Some(record.id);
        wl.project = record.project;
        wl.description = record.description;
        wl.tags = record.tags;

        calculate_key(&mut wl);
        calculate_activity(&mut wl);
        wl
    }
}

pub struct TogglClient {
    config: TogglConfig,
    http: Client,
    workspace_id: Option<i64>,
}

impl TogglClient {
    pub fn new(config: TogglConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: http_client()?,
            workspace_id: None,
        })
    }

    fn api_url(&self, relative_url: &str) -> String {
        format!("{}/api/v9/{relative_url}", self.config.url)
    }

    fn reports_api_url(&self, relative_url: &str) -> String {
        format!("{}/reports/api/v2/{relative_url}", self.config.url)
    }

    async fn report_page(
        &self,
        workspace_id: i64,
        since: &str,
        until: &str,
        page: i64,
    ) -> Result<DetailedReportPage> {
        let url = self.reports_api_url("details");
        let workspace_id = workspace_id.to_string();
        let page = page.to_string();
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.token, Some("api_token"))
            .query(&[
                ("user_agent", self.config.user_agent.as_str()),
                ("workspace_id", workspace_id.as_str()),
                ("since", since),
                ("until", until),
                ("page", page.as_str()),
            ])
            .send()
            .await?;
        let response = ensure_success(response, "get_detailed_report", &url).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TimeEntrySource for TogglClient {
    async fn login(&mut self) -> Result<()> {
        self.config.validate()?;

        let url = self.api_url("workspaces");
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.token, Some("api_token"))
            .send()
            .await?;
        let workspaces: Vec<Workspace> = ensure_success(response, "login", &url)
            .await?
            .json()
            .await?;

        let workspace = workspaces
            .first()
            .ok_or_else(|| anyhow!("Toggl account has no workspaces"))?;
        info!("Using Toggl workspace {}", workspace.id);
        self.workspace_id = Some(workspace.id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn detailed_report(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkLog>> {
        let workspace_id = self
            .workspace_id
            .ok_or_else(|| anyhow!("Not logged in to Toggl"))?;
        let since = period_since(start)?.to_rfc3339();
        let until = period_until(end)?.to_rfc3339();

        let records = load_report_pages(|page_number| {
            self.report_page(workspace_id, &since, &until, page_number)
        })
        .await?;

        Ok(records.into_iter().map(WorkLog::from).collect())
    }
}

/// Requests report pages starting from 1 until `per_page * page` covers `total_count`.
async fn load_report_pages<F, Fut>(mut load_page: F) -> Result<Vec<TimeEntryRecord>>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<DetailedReportPage>>,
{
    let mut records = vec![];
    let mut page_number = 0;
    loop {
        page_number += 1;
        let page = load_page(page_number).await?;
        debug!(
            "Loaded report page {page_number}, {} entries of {}",
            page.data.len(),
            page.total_count
        );

        records.extend(page.data);

        if page.per_page <= 0 || page.per_page * page_number >= page.total_count {
            break;
        }
    }
    Ok(records)
}

/// Finds the issue key either in a `key_<ISSUE>` tag or in a `<ISSUE>. description` prefix. In
/// the latter case the prefix is cut off the description. Keys are upper-cased the way JIRA and
/// Tempo return them.
pub fn calculate_key(wl: &mut WorkLog) {
    let key_tag = wl.tags.iter().find(|tag| tag.starts_with(KEY_TAG_PREFIX));

    if let Some(key_tag) = key_tag {
        let key = key_tag.rsplit('_').next().unwrap_or_default();
        wl.key = key_is_correct(key).then(|| key.to_uppercase());
        return;
    }

    let Some(description) = wl.description.as_deref() else {
        wl.key = None;
        return;
    };
    let Some((key, rest)) = description.split_once('.') else {
        wl.key = None;
        return;
    };

    if key_is_correct(key) {
        wl.key = Some(key.to_uppercase());
        wl.description = Some(rest.trim().to_string());
    } else {
        wl.key = None;
    }
}

fn key_is_correct(issue_key: &str) -> bool {
    ISSUE_KEY_RE.is_match(issue_key)
}

pub fn calculate_activity(wl: &mut WorkLog) {
    let Some(project) = wl.project.as_deref() else {
        return;
    };

    let activity = PROJECTS_TO_ACTIVITIES
        .iter()
        .find(|(name, _)| *name == project)
        .map(|(_, activity)| *activity)
        .unwrap_or(FALLBACK_ACTIVITY);
    wl.activity = Some(activity.to_string());
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use anyhow::{anyhow, Result};
    use chrono::{DateTime, NaiveDateTime};

    use crate::worklog::WorkLog;

    use super::{
        calculate_activity, calculate_key, load_report_pages, DetailedReportPage, TimeEntryRecord,
    };

    fn create_default_worklog() -> WorkLog {
        let start = NaiveDateTime::parse_from_str("2020-10-29 17:15", "%Y-%m-%d %H:%M").unwrap();
        let end = NaiveDateTime::parse_from_str("2020-10-29 17:30", "%Y-%m-%d %H:%M").unwrap();
        let mut wl = WorkLog::new(start, end, 15 * 60);
        wl.master_id = Some(100);
        wl.project = Some("TEST".into());
        wl.description = Some("TEST-001. Development.".into());
        wl
    }

    #[test]
    fn key_from_description_without_dot_after_key_is_none() {
        let mut wl = create_default_worklog();
        wl.description = Some("TEST-001 Development".into());

        calculate_key(&mut wl);

        assert_eq!(wl.key, None);
        assert_eq!(wl.description.as_deref(), Some("TEST-001 Development"));
    }

    #[test]
    fn key_from_description_is_cut_off() {
        let mut wl = create_default_worklog();

        calculate_key(&mut wl);

        assert_eq!(wl.key.as_deref(), Some("TEST-001"));
        assert_eq!(wl.description.as_deref(), Some("Development."));
    }

    #[test]
    fn description_prefix_must_look_like_key() {
        let mut wl = create_default_worklog();
        wl.description = Some("Daily sync. Talked about stuff".into());

        calculate_key(&mut wl);

        assert_eq!(wl.key, None);
        assert_eq!(
            wl.description.as_deref(),
            Some("Daily sync. Talked about stuff")
        );
    }

    #[test]
    fn key_tag_wins_over_description() {
        let mut wl = create_default_worklog();
        wl.tags = vec!["billable".into(), "key_PROJ-42".into()];

        calculate_key(&mut wl);

        assert_eq!(wl.key.as_deref(), Some("PROJ-42"));
        // Description stays untouched when the key comes from a tag.
        assert_eq!(wl.description.as_deref(), Some("TEST-001. Development."));
    }

    #[test]
    fn lowercase_keys_are_normalized() {
        let mut wl = create_default_worklog();
        wl.description = Some("abc-12. Fix login".into());

        calculate_key(&mut wl);

        assert_eq!(wl.key.as_deref(), Some("ABC-12"));
        assert_eq!(wl.description.as_deref(), Some("Fix login"));

        let mut wl = create_default_worklog();
        wl.tags = vec!["key_proj-42".into()];

        calculate_key(&mut wl);

        assert_eq!(wl.key.as_deref(), Some("PROJ-42"));
    }

    #[test]
    fn malformed_key_tag_gives_no_key() {
        let mut wl = create_default_worklog();
        wl.tags = vec!["key_nothing".into()];

        calculate_key(&mut wl);

        assert_eq!(wl.key, None);
    }

    #[test]
    fn missing_description_gives_no_key() {
        let mut wl = create_default_worklog();
        wl.description = None;

        calculate_key(&mut wl);

        assert_eq!(wl.key, None);
    }

    #[test]
    fn activity_from_project() {
        let mut wl = create_default_worklog();
        wl.project = Some("CR Fixes".into());
        calculate_activity(&mut wl);
        assert_eq!(wl.activity.as_deref(), Some("Code Review Fixes"));

        wl.project = Some("Something else".into());
        calculate_activity(&mut wl);
        assert_eq!(wl.activity.as_deref(), Some("Other"));

        let mut wl = create_default_worklog();
        wl.project = None;
        calculate_activity(&mut wl);
        assert_eq!(wl.activity, None);
    }

    #[test]
    fn report_page_is_converted() -> Result<()> {
        let page: DetailedReportPage = serde_json::from_str(
            r#"{
                "total_count": 1,
                "per_page": 50,
                "data": [{
                    "id": 1234,
                    "project": "Analysis",
                    "description": "ABC-7. Read requirements",
                    "start": "2020-10-29T17:15:42+02:00",
                    "end": "2020-10-29T17:45:10+02:00",
                    "dur": 1768000,
                    "tags": []
                }]
            }"#,
        )?;

        let wl: WorkLog = page.data.into_iter().next().unwrap().into();

        assert_eq!(wl.master_id, Some(1234));
        assert_eq!(wl.key.as_deref(), Some("ABC-7"));
        assert_eq!(wl.activity.as_deref(), Some("Design/Analysis"));
        assert_eq!(wl.description.as_deref(), Some("Read requirements"));
        assert_eq!(wl.duration, 1768);
        assert_eq!(
            wl.start,
            NaiveDateTime::parse_from_str("2020-10-29 17:15", "%Y-%m-%d %H:%M")?
        );
        assert_eq!(
            wl.end,
            NaiveDateTime::parse_from_str("2020-10-29 17:45", "%Y-%m-%d %H:%M")?
        );
        assert!(!wl.is_invalid());
        Ok(())
    }

    fn report_page(page_number: i64, per_page: i64, total_count: i64) -> DetailedReportPage {
        let first_id = (page_number - 1) * per_page;
        let last_id = total_count.min(first_id + per_page);
        DetailedReportPage {
            per_page,
            total_count,
            data: (first_id..last_id)
                .map(|id| TimeEntryRecord {
                    id,
                    project: None,
                    description: None,
                    start: DateTime::parse_from_rfc3339("2020-10-29T17:15:00+02:00").unwrap(),
                    end: None,
                    dur: 60_000,
                    tags: vec![],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn report_pages_are_loaded_until_total_count() -> Result<()> {
        let mut requested = vec![];

        let records = load_report_pages(|page_number| {
            requested.push(page_number);
            ready(Ok(report_page(page_number, 2, 5)))
        })
        .await?;

        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(
            records.iter().map(|v| v.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        Ok(())
    }

    #[tokio::test]
    async fn full_last_page_stops_loading() -> Result<()> {
        let mut requested = vec![];

        let records = load_report_pages(|page_number| {
            requested.push(page_number);
            ready(Ok(report_page(page_number, 2, 4)))
        })
        .await?;

        assert_eq!(requested, vec![1, 2]);
        assert_eq!(records.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn empty_report_is_a_single_request() -> Result<()> {
        let mut requested = 0;

        let records = load_report_pages(|page_number| {
            requested += 1;
            ready(Ok(report_page(page_number, 50, 0)))
        })
        .await?;

        assert_eq!(requested, 1);
        assert!(records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_page_fails_the_report() {
        let result = load_report_pages(|page_number| {
            ready(if page_number == 2 {
                Err(anyhow!("get_detailed_report: status 500"))
            } else {
                Ok(report_page(page_number, 2, 5))
            })
        })
        .await;

        assert!(result.is_err());
    }
}
