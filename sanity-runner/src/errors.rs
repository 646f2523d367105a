// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by sanity-runner.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use thiserror::Error;

/// An error that occurred while loading or validating the configuration file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("error reading config file from `{path}`")]
    Read {
        /// The path that was attempted.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// The config file is not valid TOML.
    #[error("error parsing config file at `{path}`")]
    Parse {
        /// The path that was parsed.
        path: Utf8PathBuf,
        /// The underlying TOML error.
        #[source]
        error: Box<toml::de::Error>,
    },

    /// No rspec command was specified.
    #[error("no rspec command specified in config")]
    MissingCommand,

    /// No persistence file was specified.
    #[error(
        "no persistence file specified in config\n\
         set `persistence_file` to the path rspec writes example statuses to, \
         configured in rspec as:\n\
         config.example_status_persistence_file_path = 'spec/examples.txt'"
    )]
    MissingPersistenceFile,

    /// A required field of a tracker table is missing or blank.
    #[error("no {tracker} {field} specified in config")]
    MissingTrackerField {
        /// The tracker table the field belongs to.
        tracker: &'static str,
        /// The missing field.
        field: &'static str,
    },

    /// A required environment variable is not set.
    #[error("specify the {tracker} {what} under the {var} environment variable")]
    MissingEnvVar {
        /// The tracker the variable belongs to.
        tracker: &'static str,
        /// What the variable holds, e.g. `token`.
        what: &'static str,
        /// The variable name.
        var: &'static str,
    },
}

/// An error that occurred while reading the example-status persistence file.
#[derive(Debug, Error)]
#[error("error reading example statuses from `{path}`")]
pub struct PersistenceReadError {
    path: Utf8PathBuf,
    #[source]
    error: io::Error,
}

impl PersistenceReadError {
    pub(crate) fn new(path: &Utf8Path, error: io::Error) -> Self {
        Self {
            path: path.to_owned(),
            error,
        }
    }
}

/// An error that occurred while executing one attempt of the test command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The command line contained no tokens at all.
    #[error("empty command line")]
    EmptyCommandLine,

    /// The child process could not be started.
    #[error("failed to start `{command}`")]
    Spawn {
        /// The full command line.
        command: String,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// Waiting on the child process failed.
    #[error("failed to wait on `{command}`")]
    Wait {
        /// The full command line.
        command: String,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// The child exited with a non-zero code.
    #[error("`{command}` exited with code {code}")]
    ExitedNonZero {
        /// The full command line.
        command: String,
        /// The child's exit code.
        code: i32,
    },

    /// The child was killed by a signal before producing an exit code.
    #[error("`{command}` was terminated by a signal")]
    Terminated {
        /// The full command line.
        command: String,
    },
}

/// An error produced by the run/rerun orchestration.
///
/// Carried inside [`RunResult`](crate::runner::RunResult) rather than
/// returned: the final exit code is meaningful even when an attempt failed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// An attempt of the test command failed.
    #[error("test command failed")]
    Command(#[from] CommandError),

    /// The persistence file could not be read between attempts.
    #[error("failed to collect example statuses")]
    ResultRead(#[from] PersistenceReadError),
}

/// An error that occurred while rendering a report template.
#[derive(Debug, Error)]
#[error("failed to render report template")]
pub struct TemplateError {
    #[from]
    error: minijinja::Error,
}

/// An error returned by an issue tracker request.
#[derive(Debug, Error)]
#[error("{tracker} API request failed")]
pub struct TrackerError {
    tracker: &'static str,
    #[source]
    error: Box<dyn std::error::Error + Send + Sync>,
}

impl TrackerError {
    /// Wraps a tracker transport or protocol error under the tracker's name.
    pub fn new(
        tracker: &'static str,
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            tracker,
            error: error.into(),
        }
    }
}

/// An error that occurred while reporting flaky examples.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The user template failed to parse or render.
    #[error("failed to render the report body")]
    Template(#[from] TemplateError),

    /// A tracker search, create or comment request failed.
    #[error("issue tracker request failed")]
    Tracker(#[from] TrackerError),
}
