//! `dockmod call` — Run one invocation request.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;
use dockmod_common::config::DockmodConfig;
use dockmod_sdk::protocol::{CallResponse, FunctionCall};

use crate::output;

/// Arguments for the `call` command.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// File holding the JSON request; stdin when omitted.
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pub pretty: bool,
}

/// Executes the `call` command.
///
/// The response is always printed; the exit code is non-zero when the
/// call failed.
///
/// # Errors
///
/// Returns an error if the request cannot be read or is not a call.
pub fn execute(config: &DockmodConfig, args: &CallArgs) -> anyhow::Result<ExitCode> {
    let request = read_request(args.input.as_deref())?;
    let call: FunctionCall =
        serde_json::from_str(&request).context("request is not a valid function call")?;

    let module = super::load_module(config)?;
    let response = module.dispatch(&call);
    output::write_json(&response, args.pretty)?;

    Ok(match response {
        CallResponse::Ok { .. } => ExitCode::SUCCESS,
        CallResponse::Error { .. } => ExitCode::FAILURE,
    })
}

fn read_request(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut request = String::new();
            let _ = std::io::stdin()
                .read_to_string(&mut request)
                .context("failed to read stdin")?;
            Ok(request)
        }
    }
}
