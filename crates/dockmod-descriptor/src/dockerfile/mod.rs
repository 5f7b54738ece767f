//! Dockerfile introspection.
//!
//! Extracts the pieces of a Dockerfile that become function arguments:
//! named build stages, build arguments, and secret mounts.

pub mod lexer;

use std::collections::BTreeMap;
use std::fmt;

use dockmod_common::error::{DockmodError, Result};

use self::lexer::Instruction;

/// A parsed Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dockerfile {
    filename: String,
    instructions: Vec<Instruction>,
    stages: Vec<String>,
    args: BTreeMap<String, String>,
    secrets: Vec<String>,
}

impl Dockerfile {
    /// Parses a Dockerfile and extracts its stages, args, and secrets.
    ///
    /// `ARG` defaults are kept verbatim: `ARG A=${B}` is not interpolated.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text cannot be tokenized or an `ARG`
    /// declaration contains more than one `=`.
    pub fn parse(filename: impl Into<String>, content: &str) -> Result<Self> {
        let filename = filename.into();
        tracing::info!(filename = %filename, "parsing Dockerfile");

        let instructions = lexer::tokenize(&filename, content)?;

        let mut stages = Vec::new();
        let mut args = BTreeMap::new();
        let mut secrets: Vec<String> = Vec::new();

        for inst in &instructions {
            match inst.keyword.as_str() {
                "FROM" => {
                    // Anonymous stages (`FROM image`) are skipped.
                    if inst.args.len() == 3 && inst.args[1].eq_ignore_ascii_case("as") {
                        stages.push(inst.args[2].clone());
                    }
                }
                "ARG" => {
                    for declaration in &inst.args {
                        let (key, value) = parse_arg(&filename, inst.line, declaration)?;
                        let _ = args.insert(key, value);
                    }
                }
                "RUN" => {
                    for id in inst.flags.iter().filter_map(|f| secret_mount_id(f)) {
                        if !secrets.contains(&id) {
                            secrets.push(id);
                        }
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(
            stages = stages.len(),
            args = args.len(),
            secrets = secrets.len(),
            "Dockerfile parsed"
        );

        Ok(Self {
            filename,
            instructions,
            stages,
            args,
            secrets,
        })
    }

    /// Returns the file name of the Dockerfile.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns named build stages in declaration order.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Returns build arguments and their defaults (`""` when none).
    pub const fn args(&self) -> &BTreeMap<String, String> {
        &self.args
    }

    /// Returns secret ids mounted by `RUN` steps.
    pub fn secrets(&self) -> &[String] {
        &self.secrets
    }

    /// Returns the raw instruction list.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// Splits an `ARG` declaration on its first `=`.
fn parse_arg(filename: &str, line: usize, declaration: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = declaration.split('=').collect();
    match parts.as_slice() {
        [key] => Ok(((*key).to_string(), String::new())),
        [key, value] => Ok(((*key).to_string(), (*value).to_string())),
        _ => Err(DockmodError::Parse {
            descriptor: filename.to_string(),
            message: format!("line {line}: invalid ARG: {declaration}"),
        }),
    }
}

/// Extracts the secret id of a `--mount=type=secret,...` flag.
///
/// Without an explicit `id` the base name of the target path is used.
fn secret_mount_id(flag: &str) -> Option<String> {
    let options = flag.strip_prefix("--mount=")?;

    let mut is_secret = false;
    let mut id = None;
    let mut target = None;
    for option in options.split(',') {
        match option.split_once('=') {
            Some(("type", "secret")) => is_secret = true,
            Some(("id", value)) => id = Some(value),
            Some(("target" | "dst" | "destination", value)) => target = Some(value),
            _ => {}
        }
    }

    if !is_secret {
        return None;
    }

    id.or_else(|| target.and_then(|t| t.rsplit('/').next()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl fmt::Display for Dockerfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filename: {}", self.filename)?;
        writeln!(f, "Stages: {}", self.stages.join(", "))?;
        writeln!(f, "Secrets: {}", self.secrets.join(", "))?;
        for (key, value) in &self.args {
            writeln!(f, "ARG {key}={value}")?;
        }
        for inst in &self.instructions {
            writeln!(f, "Command: {}", inst.keyword)?;
            for flag in &inst.flags {
                writeln!(f, "  Flag: {flag}")?;
            }
            for (idx, arg) in inst.args.iter().enumerate() {
                writeln!(f, "  Argument {}: {arg}", idx + 1)?;
            }
        }
        Ok(())
    }
}
