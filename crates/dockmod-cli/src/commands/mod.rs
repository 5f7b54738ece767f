//! CLI command definitions and dispatch.

pub mod call;
pub mod inspect;
pub mod schema;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dockmod_common::config::{DockmodConfig, EngineKind};
use dockmod_common::constants::{CODEBASE_PATH, DEFAULT_MODULE_NAME, PROXY_IMAGE};
use dockmod_descriptor::codebase::Codebase;
use dockmod_engine::docker::DockerCliEngine;
use dockmod_engine::engine::ContainerEngine;
use dockmod_engine::memory::MemoryEngine;
use dockmod_sdk::module::Module;

/// Dockmod — typed objects for the Dockerfile and Compose manifest of a
/// codebase.
#[derive(Parser, Debug)]
#[command(name = "dockmod", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the Dockerfile and/or Compose manifest.
    #[arg(long, global = true, env = "DOCKMOD_CODEBASE", default_value = CODEBASE_PATH)]
    pub codebase: PathBuf,

    /// Module name; its capitalized form names the entrypoint object.
    #[arg(long, global = true, env = "DOCKMOD_MODULE", default_value = DEFAULT_MODULE_NAME)]
    pub module: String,

    /// Container engine resolving images and builds (`memory` or `docker`).
    #[arg(long, global = true, env = "DOCKMOD_ENGINE", default_value = "memory")]
    pub engine: EngineKind,

    /// Image of the reverse proxy started by `Compose.All`.
    #[arg(long, global = true, env = "DOCKMOD_PROXY_IMAGE", default_value = PROXY_IMAGE)]
    pub proxy_image: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Cli {
    /// Builds the runtime configuration from the global flags.
    pub fn config(&self) -> DockmodConfig {
        DockmodConfig {
            codebase: self.codebase.clone(),
            module_name: self.module.clone(),
            engine: self.engine,
            proxy_image: self.proxy_image.clone(),
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the module schema as JSON.
    Schema(schema::SchemaArgs),
    /// Read one call as JSON and print its response.
    Call(call::CallArgs),
    /// Print the descriptors found in the codebase.
    Inspect(inspect::InspectArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the codebase cannot be loaded or output cannot be
/// written.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.config();
    match cli.command {
        Command::Schema(args) => schema::execute(&config, &args),
        Command::Call(args) => call::execute(&config, &args),
        Command::Inspect(args) => inspect::execute(&config, &args),
    }
}

/// Discovers the codebase descriptors.
///
/// # Errors
///
/// Returns an error if no descriptor exists or one is malformed.
pub fn load_codebase(config: &DockmodConfig) -> anyhow::Result<Codebase> {
    Codebase::discover(&config.codebase)
        .with_context(|| format!("failed to load codebase {}", config.codebase.display()))
}

/// Builds the module for the configured codebase and engine.
///
/// # Errors
///
/// Returns an error if the codebase cannot be loaded or the engine is
/// unavailable.
pub fn load_module(config: &DockmodConfig) -> anyhow::Result<Module> {
    let codebase = load_codebase(config)?;
    let engine: Arc<dyn ContainerEngine> = match config.engine {
        EngineKind::Memory => Arc::new(MemoryEngine::new()),
        EngineKind::Docker => Arc::new(
            DockerCliEngine::new(&config.codebase).context("docker engine unavailable")?,
        ),
    };
    tracing::info!(codebase = %config.codebase.display(), engine = %config.engine, "loading module");
    Ok(Module::new(config, &codebase, engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_default_to_runtime_constants() {
        let cli = Cli::try_parse_from(["dockmod", "schema"]).unwrap();
        let config = cli.config();
        assert_eq!(config.codebase, PathBuf::from(CODEBASE_PATH));
        assert_eq!(config.entrypoint_name(), "Dockmod");
        assert_eq!(config.engine, EngineKind::Memory);
        assert_eq!(config.proxy_image, PROXY_IMAGE);
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "dockmod", "call", "--input", "call.json", "--engine", "docker", "--module", "shop",
        ])
        .unwrap();
        assert_eq!(cli.engine, EngineKind::Docker);
        assert_eq!(cli.config().entrypoint_name(), "Shop");
        assert!(matches!(cli.command, Command::Call(ref args) if args.input.is_some()));
    }

    #[test]
    fn unknown_engine_is_rejected() {
        assert!(Cli::try_parse_from(["dockmod", "schema", "--engine", "podman"]).is_err());
    }

    #[test]
    fn missing_codebase_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = DockmodConfig {
            codebase: dir.path().to_path_buf(),
            ..DockmodConfig::default()
        };
        assert!(load_module(&config).is_err());
    }
}
