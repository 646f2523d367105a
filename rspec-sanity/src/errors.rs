// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use sanity_runner::errors::{ConfigError, ReportError};
use std::error::Error;
use thiserror::Error;

/// Exit codes reserved for failures of rspec-sanity itself.
///
/// When the test run itself completes (with or without genuine failures),
/// its own exit code is propagated verbatim instead.
pub enum SanityExitCode {}

impl SanityExitCode {
    /// Configuration or argument error, before any test ran.
    pub const SETUP_ERROR: i32 = 96;

    /// Filing or updating tracker tickets failed after the run.
    pub const REPORT_ERROR: i32 = 97;
}

/// A failure of rspec-sanity itself, not of the tests it ran.
#[derive(Debug, Error)]
pub enum ExpectedError {
    /// The configuration could not be loaded or validated.
    #[error("failed to load configuration")]
    ConfigLoad {
        /// The underlying error.
        #[from]
        err: ConfigError,
    },

    /// Reporting flaky examples to the tracker failed.
    #[error("failed to report flaky examples")]
    ReportFailed {
        /// The underlying error.
        #[from]
        err: ReportError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigLoad { .. } => SanityExitCode::SETUP_ERROR,
            Self::ReportFailed { .. } => SanityExitCode::REPORT_ERROR,
        }
    }

    /// Displays this error to stderr, including its source chain.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error: Option<&dyn Error> = match self {
            Self::ConfigLoad { err } => {
                tracing::error!("failed to load configuration");
                Some(err as &dyn Error)
            }
            Self::ReportFailed { err } => {
                tracing::error!("failed to report flaky examples");
                Some(err as &dyn Error)
            }
        };

        while let Some(error) = next_error {
            tracing::error!(
                target: NO_HEADING_TARGET,
                "  {} {}",
                "caused by:".style(styles.bold),
                error,
            );
            next_error = error.source();
        }
    }
}
