//! Global configuration model for a Dockmod runtime.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DockmodError;

/// Which container engine backs the object API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process engine that records operations without running anything.
    #[default]
    Memory,
    /// Engine shelling out to the `docker` CLI.
    Docker,
}

impl FromStr for EngineKind {
    type Err = DockmodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "docker" => Ok(Self::Docker),
            other => Err(DockmodError::config(format!("unknown engine: {other}"))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Docker => write!(f, "docker"),
        }
    }
}

/// Root configuration for a Dockmod runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockmodConfig {
    /// Directory holding the user's Dockerfile and/or Compose manifest.
    pub codebase: PathBuf,
    /// Module name as registered by the orchestrator.
    pub module_name: String,
    /// Engine used to resolve containers.
    pub engine: EngineKind,
    /// Image used for the aggregating proxy.
    pub proxy_image: String,
}

impl DockmodConfig {
    /// Returns the module name with its first letter upper-cased, which is
    /// the name of the entrypoint object.
    #[must_use]
    pub fn entrypoint_name(&self) -> String {
        let mut chars = self.module_name.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })
    }
}

impl Default for DockmodConfig {
    fn default() -> Self {
        Self {
            codebase: PathBuf::from(crate::constants::CODEBASE_PATH),
            module_name: crate::constants::DEFAULT_MODULE_NAME.to_string(),
            engine: EngineKind::default(),
            proxy_image: crate::constants::PROXY_IMAGE.to_string(),
        }
    }
}
