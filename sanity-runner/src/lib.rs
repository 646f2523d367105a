// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [rspec-sanity](https://crates.io/crates/rspec-sanity).
//!
//! Runs an RSpec suite, reruns failures once, diffs the two outcome sets to
//! find flaky examples, and files or updates one tracker ticket per spec
//! file. The CLI surface lives in the `rspec-sanity` crate.

pub mod config;
pub mod errors;
pub mod example;
pub mod persistence;
pub mod reporter;
pub mod runner;
pub mod template;
