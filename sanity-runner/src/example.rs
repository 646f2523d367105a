// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted rspec example statuses and the flaky-detection diff.

use serde::{Serialize, Serializer};
use std::fmt;

/// Status column of one persisted example row.
///
/// Anything other than `passed` or `failed` (e.g. `pending`) is preserved
/// verbatim but counts as neither.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExampleStatus {
    /// The example passed.
    Passed,
    /// The example failed.
    Failed,
    /// Any other status, kept as written.
    Other(String),
}

impl ExampleStatus {
    /// Parses the raw status column value.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "passed" => ExampleStatus::Passed,
            "failed" => ExampleStatus::Failed,
            other => ExampleStatus::Other(other.to_owned()),
        }
    }

    /// The status as it appeared in the persistence file.
    pub fn as_str(&self) -> &str {
        match self {
            ExampleStatus::Passed => "passed",
            ExampleStatus::Failed => "failed",
            ExampleStatus::Other(other) => other,
        }
    }

    /// True for `passed` exactly.
    pub fn is_passed(&self) -> bool {
        matches!(self, ExampleStatus::Passed)
    }

    /// True for `failed` exactly.
    pub fn is_failed(&self) -> bool {
        matches!(self, ExampleStatus::Failed)
    }
}

impl fmt::Display for ExampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExampleStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One executed example from rspec's example-status persistence file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpecExample {
    /// Example identifier, `<filename>[<location>]`,
    /// e.g. `./spec/foo_spec.rb[1:2]`.
    pub id: String,
    /// Outcome of this example.
    pub status: ExampleStatus,
}

impl SpecExample {
    /// The filename portion of the id: everything before the first `[`, or
    /// the whole id if there is none. Flaky examples are grouped per file
    /// under this key.
    pub fn file_key(&self) -> &str {
        match self.id.find('[') {
            Some(idx) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// Parses one `<id> | <status> | <extra...> |` row of the persistence
    /// file. Only the first two fields are consumed; surrounding whitespace
    /// is trimmed. Returns `None` for rows missing the status column.
    pub fn parse_row(line: &str) -> Option<Self> {
        let mut fields = line.split('|');
        let id = fields.next()?.trim();
        let status = fields.next()?.trim();

        Some(Self {
            id: id.to_owned(),
            status: ExampleStatus::from_raw(status),
        })
    }
}

/// Returns the examples that failed in `first_run` and passed in `second_run`.
///
/// Pure diff over the two outcome sets: correlation is by exact id equality,
/// the returned records are the first-run ones in first-run order, and a
/// match is a membership test, so duplicate ids in `second_run` never
/// produce duplicate entries. Quadratic, which is fine for a single suite's
/// worth of rows.
pub fn find_flakies(first_run: &[SpecExample], second_run: &[SpecExample]) -> Vec<SpecExample> {
    first_run
        .iter()
        .filter(|example| example.status.is_failed())
        .filter(|example| {
            second_run
                .iter()
                .any(|rerun| rerun.id == example.id && rerun.status.is_passed())
        })
        .cloned()
        .collect()
}
