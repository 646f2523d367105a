// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ExpectedError;
use crate::output::{OutputContext, OutputOpts};
use camino::Utf8PathBuf;
use clap::Parser;
use sanity_runner::config::{Config, ProcessEnv};
use sanity_runner::reporter::report_flakies;
use sanity_runner::runner::Runner;
use tracing::{debug, info};

/// Runs an RSpec suite, reruns failures once, and tickets the flaky specs
/// in your issue tracker.
///
/// The final exit code is the test command's own: a suite that fails and
/// then passes on rerun exits 0, with the flaky examples reported.
#[derive(Debug, Parser)]
#[command(name = "rspec-sanity", version)]
pub struct RspecSanityApp {
    #[command(flatten)]
    output: OutputOpts,

    /// Do not re-run the tests (also skips reporting)
    #[arg(long)]
    skip_rerun: bool,

    /// Load configuration from FILE
    #[arg(long, value_name = "FILE", default_value = ".rspec-sanity.toml")]
    config: Utf8PathBuf,

    /// Test files or directories forwarded to the rspec command
    #[arg(value_name = "PATTERN", required = true)]
    pattern: Vec<String>,
}

impl RspecSanityApp {
    /// Initializes logging and returns the output context. Call once,
    /// before [`exec`](Self::exec).
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self) -> Result<i32, ExpectedError> {
        let config = Config::load(&self.config, &ProcessEnv)?;

        let result = Runner::new(&config, &self.pattern, self.skip_rerun).run();
        if let Some(error) = &result.error {
            debug!("final run result error: {error}");
        }

        if result.has_flakies() {
            let reporter = config.reporter();
            report_flakies(reporter.as_ref(), &result.flaky_examples)?;
        } else {
            info!("no flaky examples found");
        }

        Ok(result.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        RspecSanityApp::command().debug_assert();
    }

    #[test]
    fn pattern_is_required() {
        let result = RspecSanityApp::try_parse_from(["rspec-sanity"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_flags_and_pattern() {
        let app = RspecSanityApp::try_parse_from([
            "rspec-sanity",
            "--skip-rerun",
            "--config",
            "custom.toml",
            "spec/models",
            "spec/services",
        ])
        .unwrap();

        assert!(app.skip_rerun);
        assert_eq!(app.config, Utf8PathBuf::from("custom.toml"));
        assert_eq!(app.pattern, vec!["spec/models".to_owned(), "spec/services".to_owned()]);
    }
}
