// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-attempt orchestration of the external test command.

use crate::config::Config;
use crate::errors::{CommandError, RunnerError};
use crate::example::{SpecExample, find_flakies};
use crate::persistence::collect_examples;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{info, warn};

/// Env var exposing the attempt number (1 or 2) to the child command.
pub const ATTEMPT_ENV: &str = "RSPEC_SANITY_ATTEMPT";

/// Final outcome of the run/rerun sequence.
#[derive(Debug)]
pub struct RunResult {
    /// Exit code of the last attempt that ran; becomes the program's own
    /// exit status. Always reflects the rerun when one happened, never the
    /// first attempt's failure.
    pub status_code: i32,
    /// What went wrong, if anything. A non-zero `status_code` with an empty
    /// flaky set is a genuine failure, not flakiness.
    pub error: Option<RunnerError>,
    /// Examples that failed on the first attempt and passed on the second.
    pub flaky_examples: Vec<SpecExample>,
}

impl RunResult {
    /// True if the rerun uncovered at least one flaky example.
    pub fn has_flakies(&self) -> bool {
        !self.flaky_examples.is_empty()
    }

    fn without_flakies(status_code: i32, error: Option<RunnerError>) -> Self {
        Self {
            status_code,
            error,
            flaky_examples: Vec::new(),
        }
    }
}

/// Everything one attempt produced.
#[derive(Debug)]
pub struct AttemptOutput {
    /// The child's own exit code when available, 1 on spawn failure or
    /// signal death.
    pub status_code: i32,
    /// Descriptive error for anything but a clean exit.
    pub error: Option<CommandError>,
    /// Captured stdout, also mirrored to the parent's stdout as it arrived.
    pub stdout: Vec<u8>,
    /// Captured stderr, also mirrored to the parent's stderr.
    pub stderr: Vec<u8>,
}

impl AttemptOutput {
    fn failed(status_code: i32, error: CommandError) -> Self {
        Self {
            status_code,
            error: Some(error),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

/// Runs one attempt of `command_line`, blocking until the child exits.
///
/// The command line is split on whitespace. Quoting is NOT honored, so
/// whitespace inside quoted arguments is not preserved; downstream scripts
/// rely on these exact token boundaries, keep them. The child inherits the
/// parent environment plus [`ATTEMPT_ENV`]. There is no timeout: a hung
/// child blocks indefinitely.
pub fn run_attempt(command_line: &str, attempt: u32) -> AttemptOutput {
    let tokens: Vec<&str> = command_line.split_whitespace().collect();
    let Some((program, args)) = tokens.split_first() else {
        return AttemptOutput::failed(1, CommandError::EmptyCommandLine);
    };

    info!("running external command: {tokens:?}");

    let mut child = match Command::new(program)
        .args(args)
        .env(ATTEMPT_ENV, attempt.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            return AttemptOutput::failed(
                1,
                CommandError::Spawn {
                    command: command_line.to_owned(),
                    error,
                },
            );
        }
    };

    // Tee threads drain both pipes while the child runs, so it can never
    // block on a full pipe, and the mirrored stream never waits on capture.
    let stdout_tee = child.stdout.take().map(|pipe| tee(pipe, std::io::stdout()));
    let stderr_tee = child.stderr.take().map(|pipe| tee(pipe, std::io::stderr()));

    let status = child.wait();

    let stdout = stdout_tee
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr = stderr_tee
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();

    match status {
        Ok(status) => match status.code() {
            Some(0) => AttemptOutput {
                status_code: 0,
                error: None,
                stdout,
                stderr,
            },
            Some(code) => AttemptOutput {
                status_code: code,
                error: Some(CommandError::ExitedNonZero {
                    command: command_line.to_owned(),
                    code,
                }),
                stdout,
                stderr,
            },
            None => AttemptOutput {
                status_code: 1,
                error: Some(CommandError::Terminated {
                    command: command_line.to_owned(),
                }),
                stdout,
                stderr,
            },
        },
        Err(error) => AttemptOutput {
            status_code: 1,
            error: Some(CommandError::Wait {
                command: command_line.to_owned(),
                error,
            }),
            stdout,
            stderr,
        },
    }
}

fn tee<R, W>(mut reader: R, mut writer: W) -> thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    // Best effort on the mirrored side; capture regardless.
                    let _ = writer.write_all(&buf[..n]);
                    let _ = writer.flush();
                    captured.extend_from_slice(&buf[..n]);
                }
                Err(_) => break,
            }
        }
        captured
    })
}

/// Drives the fixed two-attempt run/rerun sequence.
#[derive(Debug)]
pub struct Runner<'cfg> {
    config: &'cfg Config,
    pattern: &'cfg [String],
    skip_rerun: bool,
}

impl<'cfg> Runner<'cfg> {
    /// Creates a runner over `pattern`, the test files or directories
    /// forwarded to the test command.
    pub fn new(config: &'cfg Config, pattern: &'cfg [String], skip_rerun: bool) -> Self {
        Self {
            config,
            pattern,
            skip_rerun,
        }
    }

    /// Runs the suite, rerunning failures once to tell flaky from broken.
    ///
    /// Attempt 1 runs the full command; on a clean exit the rerun is never
    /// invoked. Otherwise the attempt-1 example statuses are read (a read
    /// failure aborts here, before any rerun), the rerun command executes
    /// restricted to previous failures, statuses are read again and the two
    /// sets are diffed into the flaky set.
    pub fn run(&self) -> RunResult {
        let command = self.config.run_command(self.pattern);
        let first = run_attempt(&command, 1);

        if first.status_code == 0 {
            info!("build succeeded at first attempt");
            return RunResult::without_flakies(0, None);
        }
        if self.skip_rerun {
            match &first.error {
                Some(error) => warn!("build failed ({error}), skipping rerun"),
                None => warn!("build failed, skipping rerun"),
            }
            return RunResult::without_flakies(first.status_code, first.error.map(Into::into));
        }

        info!("build failed, rerunning failed tests");

        let first_run = match collect_examples(&self.config.persistence_file) {
            Ok(examples) => examples,
            // Without the first outcome set a rerun can't prove anything;
            // fail fast instead of rerunning.
            Err(error) => {
                return RunResult::without_flakies(first.status_code, Some(error.into()));
            }
        };

        let command = self.config.rerun_command(self.pattern);
        let second = run_attempt(&command, 2);

        let second_run = match collect_examples(&self.config.persistence_file) {
            Ok(examples) => examples,
            Err(error) => {
                return RunResult::without_flakies(second.status_code, Some(error.into()));
            }
        };

        RunResult {
            status_code: second.status_code,
            error: second.error.map(Into::into),
            flaky_examples: find_flakies(&first_run, &second_run),
        }
    }
}
