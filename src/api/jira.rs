use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::JiraConfig;

use super::{ensure_success, http_client};

const JQL_SEPARATOR: &str = ",";
/// Issues requested per search call, also the JIRA default page size.
const SEARCH_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraUser {
    pub account_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MyselfResponse {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
    name: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
}

impl TryFrom<MyselfResponse> for JiraUser {
    type Error = anyhow::Error;

    fn try_from(value: MyselfResponse) -> Result<Self> {
        let account_id = value
            .account_id
            .ok_or_else(|| anyhow!("Couldn't read JIRA account identifier."))?;
        Ok(Self {
            account_id,
            name: value.name.or(value.display_name),
            email: value.email_address,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraIssue {
    pub uri: String,
    pub key: String,
    pub project_key: String,
}

#[derive(Debug, Deserialize)]
struct IssueRecord {
    #[serde(rename = "self")]
    uri: String,
    key: String,
}

impl From<IssueRecord> for JiraIssue {
    fn from(IssueRecord { uri, key }: IssueRecord) -> Self {
        let project_key = key
            .split_once('-')
            .map(|(project, _)| project.to_string())
            .unwrap_or_else(|| key.clone());
        Self {
            uri,
            key,
            project_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<IssueRecord>,
}

pub struct JiraClient {
    config: JiraConfig,
    http: Client,
    user: Option<JiraUser>,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: http_client()?,
            user: None,
        })
    }

    fn api_url(&self, relative_url: &str) -> String {
        format!(
            "{}/rest/api/3/{relative_url}",
            self.config.host.trim_end_matches('/')
        )
    }

    pub fn user(&self) -> Option<&JiraUser> {
        self.user.as_ref()
    }

    /// Basic authentication with a JIRA API token. Does nothing if already logged in.
    pub async fn login(&mut self) -> Result<&JiraUser> {
        if self.user.is_none() {
            self.config.validate()?;

            let url = self.api_url("myself");
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.config.user, Some(&self.config.token))
                .send()
                .await?;
            let myself: MyselfResponse = ensure_success(response, "Basic Authentication", &url)
                .await?
                .json()
                .await?;
            let user = JiraUser::try_from(myself)?;
            info!("Logged in to JIRA as {}", user.account_id);
            self.user = Some(user);
        }

        self.user
            .as_ref()
            .ok_or_else(|| anyhow!("JIRA user is missing after login"))
    }

    pub async fn search_issue(&self, key: &str) -> Result<Option<JiraIssue>> {
        let url = self.api_url(&format!("issue/{key}"));
        debug!("search_issue: Request method: {url}");
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.user, Some(&self.config.token))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record: IssueRecord = ensure_success(response, "search_issue", &url)
            .await?
            .json()
            .await?;
        Ok(Some(record.into()))
    }

    pub async fn search_issues(&self, keys: &[String]) -> Result<Vec<JiraIssue>> {
        let url = self.api_url("search");
        let mut issues = vec![];

        for chunk in keys.chunks(SEARCH_PAGE_SIZE) {
            let body = json!({
                "jql": format!("key IN ({})", chunk.join(JQL_SEPARATOR)),
                "fields": ["key", "summary", "self"],
                "maxResults": SEARCH_PAGE_SIZE,
                // Unknown keys produce warnings instead of failing the whole query.
                "validateQuery": "warn",
            });
            let response = self
                .http
                .post(&url)
                .basic_auth(&self.config.user, Some(&self.config.token))
                .json(&body)
                .send()
                .await?;
            let result: SearchResponse = ensure_success(response, "search_issues", &url)
                .await?
                .json()
                .await?;
            issues.extend(result.issues.into_iter().map(JiraIssue::from));
        }

        Ok(issues)
    }

    /// Same as [Self::search_issues] but falls back to fetching issues one by one when the search
    /// endpoint refuses the query.
    pub async fn find_issues(&self, keys: &[String]) -> Result<Vec<JiraIssue>> {
        match self.search_issues(keys).await {
            Ok(issues) => Ok(issues),
            Err(e) => {
                error!("Issue search failed, checking issues one by one: {e:?}");
                let mut issues = vec![];
                for key in keys {
                    if let Some(issue) = self.search_issue(key).await? {
                        issues.push(issue);
                    }
                }
                Ok(issues)
            }
        }
    }
}
