// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration: a TOML file plus environment-sourced tracker secrets.

use crate::errors::ConfigError;
use crate::reporter::{GithubClient, JiraClient, NullReporter, Reporter, TrackerReporter};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::HashMap;

/// Env var holding the GitHub API token.
pub const GITHUB_TOKEN_ENV: &str = "RSPEC_SANITY_GITHUB_TOKEN";
/// Env var holding the Jira API token.
pub const JIRA_TOKEN_ENV: &str = "RSPEC_SANITY_JIRA_TOKEN";
/// Env var holding the Jira user (email).
pub const JIRA_USER_ENV: &str = "RSPEC_SANITY_JIRA_USER";
/// Env var holding the Jira host, scheme included.
pub const JIRA_HOST_ENV: &str = "RSPEC_SANITY_JIRA_HOST";

/// The literal rspec flag restricting a rerun to previously failed examples.
const ONLY_FAILURES_FLAG: &str = "--only-failures";

/// Looks up process environment variables.
///
/// Tracker secrets are resolved exactly once, at config load time, through
/// this capability; nothing deeper in the call graph reads the environment.
/// Tests substitute a `HashMap`.
pub trait EnvProvider {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// [`EnvProvider`] backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvProvider for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Validated configuration for one invocation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base test command, e.g. `bundle exec rspec`.
    pub command: String,
    /// Extra arguments for the first attempt.
    pub arguments: Option<String>,
    /// Extra arguments for the rerun attempt.
    pub rerun_arguments: Option<String>,
    /// Path rspec persists example statuses to.
    pub persistence_file: Utf8PathBuf,
    /// GitHub tracker settings; takes precedence when both trackers are set.
    pub github: Option<GithubConfig>,
    /// Jira tracker settings.
    pub jira: Option<JiraConfig>,
}

/// Validated `[github]` table with its token resolved.
#[derive(Clone, Debug)]
pub struct GithubConfig {
    /// Repository owner (user or org).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Template source for issue and comment bodies.
    pub template: String,
    /// Labels applied to newly created issues.
    pub labels: Vec<String>,
    token: String,
}

impl GithubConfig {
    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

/// Validated `[jira]` table with its secrets resolved.
#[derive(Clone, Debug)]
pub struct JiraConfig {
    /// Epic every flaky-test ticket hangs under.
    pub epic_id: String,
    /// Project key.
    pub project_id: String,
    /// Issue type id used for new tickets.
    pub task_type_id: String,
    /// Template source for issue and comment bodies.
    pub template: String,
    /// Labels applied to newly created issues.
    pub labels: Vec<String>,
    token: String,
    user: String,
    host: String,
}

impl JiraConfig {
    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    command: Option<String>,
    arguments: Option<String>,
    rerun_arguments: Option<String>,
    persistence_file: Option<Utf8PathBuf>,
    github: Option<GithubTable>,
    jira: Option<JiraTable>,
}

#[derive(Debug, Deserialize)]
struct GithubTable {
    owner: Option<String>,
    repo: Option<String>,
    template: Option<String>,
    labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct JiraTable {
    epic_id: Option<String>,
    project_id: Option<String>,
    task_type_id: Option<String>,
    template: Option<String>,
    labels: Option<Vec<String>>,
}

impl GithubTable {
    fn resolve(self, env: &dyn EnvProvider) -> Result<GithubConfig, ConfigError> {
        let owner = require("github", "owner", self.owner)?;
        let repo = require("github", "repo", self.repo)?;
        let template = require("github", "template", self.template)?;
        let token = require_env(env, "github", "token", GITHUB_TOKEN_ENV)?;

        Ok(GithubConfig {
            owner,
            repo,
            template,
            labels: self.labels.unwrap_or_default(),
            token,
        })
    }
}

impl JiraTable {
    fn resolve(self, env: &dyn EnvProvider) -> Result<JiraConfig, ConfigError> {
        let epic_id = require("jira", "epic id", self.epic_id)?;
        let project_id = require("jira", "project id", self.project_id)?;
        let task_type_id = require("jira", "task type id", self.task_type_id)?;
        let template = require("jira", "template", self.template)?;
        let token = require_env(env, "jira", "token", JIRA_TOKEN_ENV)?;
        let user = require_env(env, "jira", "user", JIRA_USER_ENV)?;
        let host = require_env(env, "jira", "host (including scheme)", JIRA_HOST_ENV)?;

        Ok(JiraConfig {
            epic_id,
            project_id,
            task_type_id,
            template,
            labels: self.labels.unwrap_or_default(),
            token,
            user,
            host,
        })
    }
}

fn require(
    tracker: &'static str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, ConfigError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingTrackerField { tracker, field })
}

fn require_env(
    env: &dyn EnvProvider,
    tracker: &'static str,
    what: &'static str,
    var: &'static str,
) -> Result<String, ConfigError> {
    env.var(var)
        .ok_or(ConfigError::MissingEnvVar { tracker, what, var })
}

impl Config {
    /// Loads and validates the config at `path`, resolving tracker secrets
    /// through `env`.
    pub fn load(path: &Utf8Path, env: &dyn EnvProvider) -> Result<Self, ConfigError> {
        let contents =
            fs_err::read_to_string(path.as_std_path()).map_err(|error| ConfigError::Read {
                path: path.to_owned(),
                error,
            })?;
        let file: ConfigFile = toml::from_str(&contents).map_err(|error| ConfigError::Parse {
            path: path.to_owned(),
            error: Box::new(error),
        })?;

        let command = file
            .command
            .filter(|command| !command.trim().is_empty())
            .ok_or(ConfigError::MissingCommand)?;
        let persistence_file = file
            .persistence_file
            .filter(|path| !path.as_str().trim().is_empty())
            .ok_or(ConfigError::MissingPersistenceFile)?;

        Ok(Self {
            command,
            arguments: file.arguments,
            rerun_arguments: file.rerun_arguments,
            persistence_file,
            github: file.github.map(|table| table.resolve(env)).transpose()?,
            jira: file.jira.map(|table| table.resolve(env)).transpose()?,
        })
    }

    /// Command line for the first attempt.
    pub fn run_command(&self, pattern: &[String]) -> String {
        let mut tokens: Vec<&str> = vec![&self.command];
        if let Some(arguments) = &self.arguments {
            tokens.push(arguments);
        }
        tokens.extend(pattern.iter().map(String::as_str));
        join_command(&tokens)
    }

    /// Command line for the rerun attempt; adds the rspec flag restricting
    /// execution to previously failed examples.
    pub fn rerun_command(&self, pattern: &[String]) -> String {
        let mut tokens: Vec<&str> = vec![&self.command];
        if let Some(arguments) = &self.rerun_arguments {
            tokens.push(arguments);
        }
        tokens.push(ONLY_FAILURES_FLAG);
        tokens.extend(pattern.iter().map(String::as_str));
        join_command(&tokens)
    }

    /// Builds the configured reporter. GitHub wins when both tables are
    /// present; with neither, a logging no-op stands in so callers never
    /// special-case "no tracker".
    pub fn reporter(&self) -> Box<dyn Reporter> {
        if let Some(github) = &self.github {
            Box::new(TrackerReporter::new(
                GithubClient::new(github),
                &github.template,
                &github.labels,
            ))
        } else if let Some(jira) = &self.jira {
            Box::new(TrackerReporter::new(
                JiraClient::new(jira),
                &jira.template,
                &jira.labels,
            ))
        } else {
            Box::new(NullReporter)
        }
    }
}

// Unset optional fields become blank tokens; trim everything and drop the
// empties so the joined command line stays clean.
fn join_command(tokens: &[&str]) -> String {
    tokens
        .iter()
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn load_from_str(contents: &str, env: &HashMap<String, String>) -> Result<Config, ConfigError> {
        let dir = camino_tempfile::Utf8TempDir::new().unwrap();
        let path = dir.path().join(".rspec-sanity.toml");
        fs_err::write(path.as_std_path(), contents).unwrap();
        Config::load(&path, env)
    }

    fn github_env() -> HashMap<String, String> {
        HashMap::from([(GITHUB_TOKEN_ENV.to_owned(), "gh-token".to_owned())])
    }

    fn jira_env() -> HashMap<String, String> {
        HashMap::from([
            (JIRA_TOKEN_ENV.to_owned(), "jira-token".to_owned()),
            (JIRA_USER_ENV.to_owned(), "qa@example.com".to_owned()),
            (JIRA_HOST_ENV.to_owned(), "https://example.atlassian.net".to_owned()),
        ])
    }

    #[test]
    fn loads_a_full_config() {
        let config = load_from_str(
            indoc! {r#"
                command = "bundle exec rspec"
                arguments = "--format progress"
                rerun_arguments = "--format documentation"
                persistence_file = "spec/examples.txt"

                [github]
                owner = "acme"
                repo = "widgets"
                template = "{% for example in examples %}{{ example.id }}{% endfor %}"
                labels = ["flaky-test"]
            "#},
            &github_env(),
        )
        .unwrap();

        assert_eq!(config.command, "bundle exec rspec");
        assert_eq!(config.persistence_file, Utf8PathBuf::from("spec/examples.txt"));
        let github = config.github.as_ref().unwrap();
        assert_eq!(github.owner, "acme");
        assert_eq!(github.labels, vec!["flaky-test".to_owned()]);
        assert_eq!(github.token(), "gh-token");
        assert!(config.jira.is_none());
    }

    #[test]
    fn command_is_required() {
        let error = load_from_str(r#"persistence_file = "spec/examples.txt""#, &HashMap::new())
            .unwrap_err();
        assert!(matches!(error, ConfigError::MissingCommand));
    }

    #[test]
    fn persistence_file_is_required() {
        let error = load_from_str(r#"command = "rspec""#, &HashMap::new()).unwrap_err();
        assert!(matches!(error, ConfigError::MissingPersistenceFile));
    }

    #[test]
    fn github_token_comes_from_env() {
        let error = load_from_str(
            indoc! {r#"
                command = "rspec"
                persistence_file = "spec/examples.txt"

                [github]
                owner = "acme"
                repo = "widgets"
                template = "body"
            "#},
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::MissingEnvVar { var: GITHUB_TOKEN_ENV, .. }
        ));
    }

    #[test]
    fn blank_github_field_is_missing() {
        let error = load_from_str(
            indoc! {r#"
                command = "rspec"
                persistence_file = "spec/examples.txt"

                [github]
                owner = "  "
                repo = "widgets"
                template = "body"
            "#},
            &github_env(),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::MissingTrackerField { tracker: "github", field: "owner" }
        ));
    }

    #[test]
    fn jira_secrets_come_from_env() {
        let config = load_from_str(
            indoc! {r#"
                command = "rspec"
                persistence_file = "spec/examples.txt"

                [jira]
                epic_id = "QA-100"
                project_id = "QA"
                task_type_id = "10001"
                template = "body"
            "#},
            &jira_env(),
        )
        .unwrap();

        let jira = config.jira.as_ref().unwrap();
        assert_eq!(jira.user(), "qa@example.com");
        assert_eq!(jira.host(), "https://example.atlassian.net");
        assert_eq!(jira.token(), "jira-token");
        assert!(jira.labels.is_empty());
    }

    fn base_config() -> Config {
        Config {
            command: "bundle exec rspec".to_owned(),
            arguments: None,
            rerun_arguments: None,
            persistence_file: Utf8PathBuf::from("spec/examples.txt"),
            github: None,
            jira: None,
        }
    }

    #[test]
    fn run_command_drops_blank_tokens() {
        let mut config = base_config();
        config.arguments = Some("  ".to_owned());
        let pattern = vec!["spec/models".to_owned(), String::new()];
        assert_eq!(config.run_command(&pattern), "bundle exec rspec spec/models");
    }

    #[test]
    fn rerun_command_restricts_to_failures() {
        let mut config = base_config();
        config.rerun_arguments = Some("--format documentation".to_owned());
        let pattern = vec!["spec".to_owned()];
        assert_eq!(
            config.rerun_command(&pattern),
            "bundle exec rspec --format documentation --only-failures spec",
        );
    }

    #[test]
    fn reporter_prefers_github_and_defaults_to_null() {
        let mut config = base_config();
        assert_eq!(config.reporter().label(), "null");

        config.jira = Some(JiraConfig {
            epic_id: "QA-100".to_owned(),
            project_id: "QA".to_owned(),
            task_type_id: "10001".to_owned(),
            template: "body".to_owned(),
            labels: Vec::new(),
            token: "t".to_owned(),
            user: "u".to_owned(),
            host: "https://example.atlassian.net".to_owned(),
        });
        assert_eq!(config.reporter().label(), "jira");

        config.github = Some(GithubConfig {
            owner: "acme".to_owned(),
            repo: "widgets".to_owned(),
            template: "body".to_owned(),
            labels: Vec::new(),
            token: "t".to_owned(),
        });
        assert_eq!(config.reporter().label(), "github");
    }
}
