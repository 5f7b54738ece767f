//! Output helpers for CLI commands.
//!
//! Everything goes to stdout so protocol responses can be piped; logs are
//! written to stderr by the tracing subscriber.

use std::io::Write;

use dockmod_common::constants::APP_NAME;
use dockmod_descriptor::codebase::Codebase;
use serde::Serialize;

/// Writes `value` as one JSON document followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    write_text(&json)
}

/// Writes `text` followed by a newline.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_text(text: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}

/// Renders a human-readable summary of the descriptors of a codebase.
#[must_use]
pub fn describe_codebase(codebase: &Codebase) -> String {
    let mut out = format!("{APP_NAME} codebase: {}\n", codebase.root().display());
    match codebase.dockerfile() {
        Some(dockerfile) => {
            out.push_str("\n[Dockerfile]\n");
            out.push_str(&dockerfile.to_string());
        }
        None => out.push_str("\nNo Dockerfile found.\n"),
    }
    match codebase.compose() {
        Some(project) => {
            out.push_str("\n[Compose]\n");
            out.push_str(&project.to_string());
        }
        None => out.push_str("\nNo Compose manifest found.\n"),
    }
    out
}
