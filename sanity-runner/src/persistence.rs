// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reader for rspec's example-status persistence file.
//!
//! The file is a pipe-delimited table: a column-header line, a separator
//! line, then one row per executed example with arbitrary column padding.
//! Written by rspec when `example_status_persistence_file_path` is set.

use crate::errors::PersistenceReadError;
use crate::example::SpecExample;
use camino::Utf8Path;
use std::io::{BufRead, BufReader};
use tracing::warn;

// Column names and the `----` separator.
const HEADER_LINES: usize = 2;

/// Reads the persistence file at `path` into the examples it records, in
/// file order.
///
/// Blank lines are skipped. Rows missing the status column are skipped with
/// a warning rather than failing the read: one garbled row should not turn
/// this tool into its own source of red builds. An unreadable path is a hard
/// error.
pub fn collect_examples(path: &Utf8Path) -> Result<Vec<SpecExample>, PersistenceReadError> {
    let file = fs_err::File::open(path.as_std_path())
        .map_err(|error| PersistenceReadError::new(path, error))?;

    let mut examples = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|error| PersistenceReadError::new(path, error))?;
        if index < HEADER_LINES {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        match SpecExample::parse_row(&line) {
            Some(example) => examples.push(example),
            None => warn!("skipping malformed row in `{path}`: {line:?}"),
        }
    }

    Ok(examples)
}
