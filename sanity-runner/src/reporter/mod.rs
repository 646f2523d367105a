// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flaky-test reporting: grouping by spec file and create-vs-append
//! deduplication against an issue tracker.

mod github;
mod jira;

pub use github::GithubClient;
pub use jira::JiraClient;

use crate::errors::{ReportError, TrackerError};
use crate::example::SpecExample;
use crate::template::render_report;
use indexmap::IndexMap;
use tracing::info;

/// A ticket in the external tracker, as much of it as dedup needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerIssue {
    /// Tracker-specific identifier: GitHub issue number, Jira issue id.
    pub id: String,
    /// Issue title, compared against the file group key.
    pub title: String,
}

/// The capability contract every concrete tracker implements.
pub trait TrackerClient {
    /// Short name used in log lines, e.g. `github`.
    fn label(&self) -> &'static str;

    /// Searches existing tickets scoped to `title` (a file group key).
    fn search_issues(&self, title: &str) -> Result<Vec<TrackerIssue>, TrackerError>;

    /// Creates a new ticket.
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TrackerIssue, TrackerError>;

    /// Appends a comment to an existing ticket.
    fn add_comment(&self, issue: &TrackerIssue, body: &str) -> Result<(), TrackerError>;
}

impl<C: TrackerClient + ?Sized> TrackerClient for &C {
    fn label(&self) -> &'static str {
        (**self).label()
    }

    fn search_issues(&self, title: &str) -> Result<Vec<TrackerIssue>, TrackerError> {
        (**self).search_issues(title)
    }

    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TrackerIssue, TrackerError> {
        (**self).create_issue(title, body, labels)
    }

    fn add_comment(&self, issue: &TrackerIssue, body: &str) -> Result<(), TrackerError> {
        (**self).add_comment(issue, body)
    }
}

/// Reports flaky examples, one call per spec file.
pub trait Reporter {
    /// Short name used in log lines.
    fn label(&self) -> &'static str;

    /// Reports one file's worth of flaky examples.
    fn report_flaky(&self, group: &[SpecExample]) -> Result<(), ReportError>;
}

/// Groups `flakies` by spec file and reports each group independently.
///
/// Within a group the discovery order is preserved; groups are visited in
/// first-discovery order. The first error aborts the remaining groups, and
/// tickets already filed in the same invocation stay filed.
pub fn report_flakies(
    reporter: &dyn Reporter,
    flakies: &[SpecExample],
) -> Result<(), ReportError> {
    for group in group_by_file(flakies).values() {
        reporter.report_flaky(group)?;
    }
    Ok(())
}

fn group_by_file(flakies: &[SpecExample]) -> IndexMap<&str, Vec<SpecExample>> {
    let mut groups: IndexMap<&str, Vec<SpecExample>> = IndexMap::new();
    for example in flakies {
        groups
            .entry(example.file_key())
            .or_default()
            .push(example.clone());
    }
    groups
}

/// Null object standing in when no tracker is configured: the exact same
/// call sequence as a real reporter, with logging where the network I/O
/// would be.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn label(&self) -> &'static str {
        "null"
    }

    fn report_flaky(&self, group: &[SpecExample]) -> Result<(), ReportError> {
        if let Some(example) = group.first() {
            info!(
                "no reporter configured, skipping flaky report for {}",
                example.file_key()
            );
        }
        Ok(())
    }
}

/// Create-vs-append deduplication over any [`TrackerClient`].
#[derive(Debug)]
pub struct TrackerReporter<C> {
    client: C,
    template: String,
    labels: Vec<String>,
}

impl<C: TrackerClient> TrackerReporter<C> {
    /// Builds a reporter rendering bodies from `template` and labeling new
    /// tickets with `labels`.
    pub fn new(client: C, template: &str, labels: &[String]) -> Self {
        Self {
            client,
            template: template.to_owned(),
            labels: labels.to_vec(),
        }
    }
}

impl<C: TrackerClient> Reporter for TrackerReporter<C> {
    fn label(&self) -> &'static str {
        self.client.label()
    }

    fn report_flaky(&self, group: &[SpecExample]) -> Result<(), ReportError> {
        let Some(first) = group.first() else {
            return Ok(());
        };
        let title = first.file_key();
        let body = render_report(&self.template, group)?;

        let issues = self.client.search_issues(title)?;
        if issues.is_empty() {
            info!("[{}] no matching issues found, creating a new one", self.label());
            let issue = self.client.create_issue(title, &body, &self.labels)?;
            info!("[{}] created new issue `{}`", self.label(), issue.title);
            return Ok(());
        }

        // Prefer the exact title match; an inexact search hit is still a
        // better home for the report than a duplicate ticket.
        let issue = match issues.iter().find(|issue| issue.title == title) {
            Some(issue) => issue,
            None => {
                info!(
                    "[{}] no exact title match, falling back to the first result",
                    self.label()
                );
                &issues[0]
            }
        };
        self.client.add_comment(issue, &body)?;
        info!("[{}] added comment to issue `{}`", self.label(), issue.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::ExampleStatus;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn example(id: &str) -> SpecExample {
        SpecExample {
            id: id.to_owned(),
            status: ExampleStatus::Failed,
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Search(String),
        Create { title: String, body: String, labels: Vec<String> },
        Comment { issue_id: String, body: String },
    }

    /// In-memory tracker: canned search results, recorded calls.
    #[derive(Default)]
    struct FakeTracker {
        search_results: Vec<TrackerIssue>,
        fail_searches_after: Option<usize>,
        calls: RefCell<Vec<Call>>,
    }

    impl FakeTracker {
        fn with_results(search_results: Vec<TrackerIssue>) -> Self {
            Self {
                search_results,
                ..Self::default()
            }
        }

        fn calls(&self) -> std::cell::Ref<'_, Vec<Call>> {
            self.calls.borrow()
        }

        fn search_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| matches!(call, Call::Search(_)))
                .count()
        }
    }

    impl TrackerClient for FakeTracker {
        fn label(&self) -> &'static str {
            "fake"
        }

        fn search_issues(&self, title: &str) -> Result<Vec<TrackerIssue>, TrackerError> {
            if self.fail_searches_after == Some(self.search_count()) {
                return Err(TrackerError::new("fake", "search unavailable"));
            }
            self.calls.borrow_mut().push(Call::Search(title.to_owned()));
            Ok(self.search_results.clone())
        }

        fn create_issue(
            &self,
            title: &str,
            body: &str,
            labels: &[String],
        ) -> Result<TrackerIssue, TrackerError> {
            self.calls.borrow_mut().push(Call::Create {
                title: title.to_owned(),
                body: body.to_owned(),
                labels: labels.to_vec(),
            });
            Ok(TrackerIssue {
                id: "1".to_owned(),
                title: title.to_owned(),
            })
        }

        fn add_comment(&self, issue: &TrackerIssue, body: &str) -> Result<(), TrackerError> {
            self.calls.borrow_mut().push(Call::Comment {
                issue_id: issue.id.clone(),
                body: body.to_owned(),
            });
            Ok(())
        }
    }

    const TEMPLATE: &str = "{% for example in examples %}{{ example.id }};{% endfor %}";

    #[test]
    fn grouping_preserves_discovery_order_and_is_idempotent() {
        let flakies = vec![
            example("./spec/b_spec.rb[1:1]"),
            example("./spec/a_spec.rb[1:1]"),
            example("./spec/b_spec.rb[2:1]"),
        ];

        let groups = group_by_file(&flakies);
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, vec!["./spec/b_spec.rb", "./spec/a_spec.rb"]);
        assert_eq!(
            groups.get("./spec/b_spec.rb").unwrap(),
            &vec![example("./spec/b_spec.rb[1:1]"), example("./spec/b_spec.rb[2:1]")],
        );

        assert_eq!(group_by_file(&flakies), groups);
    }

    #[test]
    fn creates_one_issue_per_group_when_none_exist() {
        let tracker = FakeTracker::default();
        let reporter = TrackerReporter::new(&tracker, TEMPLATE, &["flaky".to_owned()]);

        let flakies = vec![
            example("./spec/a_spec.rb[1:1]"),
            example("./spec/a_spec.rb[1:2]"),
            example("./spec/b_spec.rb[1:1]"),
        ];
        report_flakies(&reporter, &flakies).unwrap();

        assert_eq!(
            *tracker.calls(),
            vec![
                Call::Search("./spec/a_spec.rb".to_owned()),
                Call::Create {
                    title: "./spec/a_spec.rb".to_owned(),
                    body: "./spec/a_spec.rb[1:1];./spec/a_spec.rb[1:2];".to_owned(),
                    labels: vec!["flaky".to_owned()],
                },
                Call::Search("./spec/b_spec.rb".to_owned()),
                Call::Create {
                    title: "./spec/b_spec.rb".to_owned(),
                    body: "./spec/b_spec.rb[1:1];".to_owned(),
                    labels: vec!["flaky".to_owned()],
                },
            ],
        );
    }

    #[test]
    fn comments_on_the_exact_title_match() {
        let tracker = FakeTracker::with_results(vec![
            TrackerIssue {
                id: "7".to_owned(),
                title: "something similar".to_owned(),
            },
            TrackerIssue {
                id: "9".to_owned(),
                title: "./spec/a_spec.rb".to_owned(),
            },
        ]);
        let reporter = TrackerReporter::new(&tracker, TEMPLATE, &[]);

        report_flakies(&reporter, &[example("./spec/a_spec.rb[1:1]")]).unwrap();

        assert_eq!(
            *tracker.calls(),
            vec![
                Call::Search("./spec/a_spec.rb".to_owned()),
                Call::Comment {
                    issue_id: "9".to_owned(),
                    body: "./spec/a_spec.rb[1:1];".to_owned(),
                },
            ],
        );
    }

    #[test]
    fn falls_back_to_the_first_result_without_an_exact_match() {
        let tracker = FakeTracker::with_results(vec![
            TrackerIssue {
                id: "3".to_owned(),
                title: "flaky: a_spec".to_owned(),
            },
            TrackerIssue {
                id: "4".to_owned(),
                title: "another one".to_owned(),
            },
        ]);
        let reporter = TrackerReporter::new(&tracker, TEMPLATE, &[]);

        report_flakies(&reporter, &[example("./spec/a_spec.rb[1:1]")]).unwrap();

        let calls = tracker.calls();
        assert!(matches!(
            &calls[1],
            Call::Comment { issue_id, .. } if issue_id == "3"
        ));
    }

    #[test]
    fn first_error_aborts_remaining_groups() {
        let tracker = FakeTracker {
            fail_searches_after: Some(1),
            ..FakeTracker::default()
        };
        let reporter = TrackerReporter::new(&tracker, TEMPLATE, &[]);

        let flakies = vec![
            example("./spec/a_spec.rb[1:1]"),
            example("./spec/b_spec.rb[1:1]"),
        ];
        let error = report_flakies(&reporter, &flakies).unwrap_err();
        assert!(matches!(error, ReportError::Tracker(_)));

        // The first group was fully reported before the abort; nothing was
        // rolled back and the second group was never searched.
        assert_eq!(
            *tracker.calls(),
            vec![
                Call::Search("./spec/a_spec.rb".to_owned()),
                Call::Create {
                    title: "./spec/a_spec.rb".to_owned(),
                    body: "./spec/a_spec.rb[1:1];".to_owned(),
                    labels: Vec::new(),
                },
            ],
        );
    }

    #[test]
    fn null_reporter_accepts_every_group() {
        let flakies = vec![example("./spec/a_spec.rb[1:1]")];
        report_flakies(&NullReporter, &flakies).unwrap();
    }
}
