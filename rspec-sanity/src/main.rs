// Copyright (c) The rspec-sanity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use rspec_sanity::RspecSanityApp;

fn main() -> Result<()> {
    color_eyre::install()?;

    let app = RspecSanityApp::parse();
    let output = app.init_output();

    match app.exec() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
