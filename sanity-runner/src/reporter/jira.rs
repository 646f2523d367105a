// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jira Cloud client over the REST v2 API.

use crate::config::JiraConfig;
use crate::errors::TrackerError;
use crate::reporter::{TrackerClient, TrackerIssue};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use ureq::Agent;

const SEARCH_MAX_RESULTS: &str = "10";

/// [`TrackerClient`] for Jira Cloud.
///
/// New tickets are filed under the configured epic; the search is likewise
/// scoped to children of that epic.
#[derive(Debug)]
pub struct JiraClient {
    agent: Agent,
    host: String,
    authorization: String,
    project_id: String,
    epic_id: String,
    task_type_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    issues: Vec<IssueResponse>,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    id: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    id: String,
    key: String,
}

impl JiraClient {
    /// Builds a client for the configured Jira site; user, token and host
    /// were resolved from the environment at config load time.
    pub fn new(config: &JiraConfig) -> Self {
        let credentials = BASE64.encode(format!("{}:{}", config.user(), config.token()));
        Self {
            agent: Agent::new_with_defaults(),
            host: config.host().trim_end_matches('/').to_owned(),
            authorization: format!("Basic {credentials}"),
            project_id: config.project_id.clone(),
            epic_id: config.epic_id.clone(),
            task_type_id: config.task_type_id.clone(),
        }
    }

    fn wrap(&self, error: ureq::Error) -> TrackerError {
        TrackerError::new(self.label(), error)
    }
}

impl TrackerClient for JiraClient {
    fn label(&self) -> &'static str {
        "jira"
    }

    fn search_issues(&self, title: &str) -> Result<Vec<TrackerIssue>, TrackerError> {
        // Epic Link covers company-managed projects, parent covers
        // team-managed ones.
        let jql = format!(
            "project = {} AND (\"Epic Link\" = {} OR parent = {}) AND text ~ \"\\\"{}\\\"\"",
            self.project_id, self.epic_id, self.epic_id, title
        );
        let mut response = self
            .agent
            .get(format!("{}/rest/api/2/search", self.host))
            .query("jql", &jql)
            .query("maxResults", SEARCH_MAX_RESULTS)
            .query("fields", "summary")
            .header("Authorization", self.authorization.as_str())
            .call()
            .map_err(|error| self.wrap(error))?;
        let results: SearchResponse = response
            .body_mut()
            .read_json()
            .map_err(|error| self.wrap(error))?;

        Ok(results
            .issues
            .into_iter()
            .map(|issue| TrackerIssue {
                id: issue.id,
                title: issue.fields.summary,
            })
            .collect())
    }

    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TrackerIssue, TrackerError> {
        let mut response = self
            .agent
            .post(format!("{}/rest/api/2/issue", self.host))
            .header("Authorization", self.authorization.as_str())
            .send_json(json!({
                "fields": {
                    "project": { "key": self.project_id },
                    "issuetype": { "id": self.task_type_id },
                    "parent": { "key": self.epic_id },
                    "summary": title,
                    "description": body,
                    "labels": labels,
                },
            }))
            .map_err(|error| self.wrap(error))?;
        let created: CreatedIssue = response
            .body_mut()
            .read_json()
            .map_err(|error| self.wrap(error))?;

        tracing::debug!("created jira issue {}", created.key);
        Ok(TrackerIssue {
            id: created.id,
            title: title.to_owned(),
        })
    }

    fn add_comment(&self, issue: &TrackerIssue, body: &str) -> Result<(), TrackerError> {
        self.agent
            .post(format!("{}/rest/api/2/issue/{}/comment", self.host, issue.id))
            .header("Authorization", self.authorization.as_str())
            .send_json(json!({ "body": body }))
            .map_err(|error| self.wrap(error))?;
        Ok(())
    }
}
