// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GitHub Issues client over the REST v3 API.

use crate::config::GithubConfig;
use crate::errors::TrackerError;
use crate::reporter::{TrackerClient, TrackerIssue};
use serde::Deserialize;
use serde_json::json;
use ureq::Agent;

const API_ROOT: &str = "https://api.github.com";
const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("rspec-sanity/", env!("CARGO_PKG_VERSION"));
const SEARCH_PAGE_SIZE: &str = "10";

/// [`TrackerClient`] for GitHub Issues.
#[derive(Debug)]
pub struct GithubClient {
    agent: Agent,
    owner: String,
    repo: String,
    authorization: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<IssueResponse>,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    title: String,
}

impl From<IssueResponse> for TrackerIssue {
    fn from(issue: IssueResponse) -> Self {
        Self {
            id: issue.number.to_string(),
            title: issue.title,
        }
    }
}

impl GithubClient {
    /// Builds a client for the configured repository; the token was resolved
    /// from the environment at config load time.
    pub fn new(config: &GithubConfig) -> Self {
        Self {
            agent: Agent::new_with_defaults(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            authorization: format!("Bearer {}", config.token()),
        }
    }

    fn wrap(&self, error: ureq::Error) -> TrackerError {
        TrackerError::new(self.label(), error)
    }
}

impl TrackerClient for GithubClient {
    fn label(&self) -> &'static str {
        "github"
    }

    fn search_issues(&self, title: &str) -> Result<Vec<TrackerIssue>, TrackerError> {
        let query = format!(
            "\"{title}\" in:title repo:{}/{} is:issue",
            self.owner, self.repo
        );
        let mut response = self
            .agent
            .get(format!("{API_ROOT}/search/issues"))
            .query("q", &query)
            .query("per_page", SEARCH_PAGE_SIZE)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|error| self.wrap(error))?;
        let results: SearchResponse = response
            .body_mut()
            .read_json()
            .map_err(|error| self.wrap(error))?;

        Ok(results.items.into_iter().map(TrackerIssue::from).collect())
    }

    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TrackerIssue, TrackerError> {
        let mut response = self
            .agent
            .post(format!(
                "{API_ROOT}/repos/{}/{}/issues",
                self.owner, self.repo
            ))
            .header("Authorization", self.authorization.as_str())
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .send_json(json!({
                "title": title,
                "body": body,
                "labels": labels,
            }))
            .map_err(|error| self.wrap(error))?;
        let issue: IssueResponse = response
            .body_mut()
            .read_json()
            .map_err(|error| self.wrap(error))?;

        Ok(issue.into())
    }

    fn add_comment(&self, issue: &TrackerIssue, body: &str) -> Result<(), TrackerError> {
        self.agent
            .post(format!(
                "{API_ROOT}/repos/{}/{}/issues/{}/comments",
                self.owner, self.repo, issue.id
            ))
            .header("Authorization", self.authorization.as_str())
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .send_json(json!({ "body": body }))
            .map_err(|error| self.wrap(error))?;
        Ok(())
    }
}
