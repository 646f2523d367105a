// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Rerun failed RSpec tests once and ticket the flaky ones.
//!
//! This crate is the CLI surface; the semantics live in [`sanity_runner`].

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputContext;
