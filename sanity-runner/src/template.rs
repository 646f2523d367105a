// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of ticket and comment bodies from user-supplied templates.

use crate::errors::TemplateError;
use crate::example::SpecExample;
use minijinja::{Environment, context};
use std::collections::BTreeMap;

/// Renders a ticket/comment body from the user's minijinja template.
///
/// The template sees two values: `examples`, the flaky group in discovery
/// order, and `env`, a map of the full process environment. For example:
///
/// ```text
/// Flaky specs detected in build {{ env.CI_JOB_URL }}:
/// {% for example in examples %}
/// - `{{ example.id }}`
/// {%- endfor %}
/// ```
pub fn render_report(
    template_source: &str,
    examples: &[SpecExample],
) -> Result<String, TemplateError> {
    let env_vars: BTreeMap<String, String> = std::env::vars().collect();
    render_with_env(template_source, examples, &env_vars)
}

fn render_with_env(
    template_source: &str,
    examples: &[SpecExample],
    env_vars: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    let env = Environment::new();
    let template = env.template_from_str(template_source)?;
    let body = template.render(context! {
        examples => examples,
        env => env_vars,
    })?;
    Ok(body)
}
