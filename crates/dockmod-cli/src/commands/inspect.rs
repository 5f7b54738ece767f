//! `dockmod inspect` — Print the descriptors found in the codebase.

use std::process::ExitCode;

use clap::Args;
use dockmod_common::config::DockmodConfig;

use crate::output;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {}

/// Executes the `inspect` command.
///
/// # Errors
///
/// Returns an error if the codebase cannot be loaded.
pub fn execute(config: &DockmodConfig, _args: &InspectArgs) -> anyhow::Result<ExitCode> {
    let codebase = super::load_codebase(config)?;
    output::write_text(&output::describe_codebase(&codebase))?;
    Ok(ExitCode::SUCCESS)
}
