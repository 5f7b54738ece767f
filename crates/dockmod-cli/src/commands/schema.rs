//! `dockmod schema` — Print the module schema.

use std::process::ExitCode;

use clap::Args;
use dockmod_common::config::DockmodConfig;

use crate::output;

/// Arguments for the `schema` command.
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Pretty-print the JSON.
    #[arg(long)]
    pub pretty: bool,
}

/// Executes the `schema` command.
///
/// # Errors
///
/// Returns an error if the codebase cannot be loaded.
pub fn execute(config: &DockmodConfig, args: &SchemaArgs) -> anyhow::Result<ExitCode> {
    let module = super::load_module(config)?;
    output::write_json(&module.schema(), args.pretty)?;
    Ok(ExitCode::SUCCESS)
}
