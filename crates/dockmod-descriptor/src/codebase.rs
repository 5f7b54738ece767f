//! Descriptor discovery in the mounted codebase.

use std::path::{Path, PathBuf};

use dockmod_common::constants::{COMPOSE_PATTERNS, DOCKERFILE_PATTERNS};
use dockmod_common::error::{DockmodError, Result};

use crate::compose::ComposeProject;
use crate::dockerfile::Dockerfile;
use crate::finder::Finder;

/// The build descriptors found at the root of a codebase.
#[derive(Debug, Clone)]
pub struct Codebase {
    root: PathBuf,
    dockerfile: Option<Dockerfile>,
    compose: Option<ComposeProject>,
}

impl Codebase {
    /// Discovers and parses the Dockerfile and Compose manifest of `root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither descriptor exists, or the
    /// parse error of whichever descriptor is malformed.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let finder = Finder::new(&root)?;

        let dockerfile = finder
            .find_file_from_pattern(DOCKERFILE_PATTERNS)
            .map(|path| -> Result<Dockerfile> {
                let content = read(&path)?;
                Dockerfile::parse(file_name(&path), &String::from_utf8_lossy(&content))
            })
            .transpose()?;

        let compose = finder
            .find_file_from_pattern(COMPOSE_PATTERNS)
            .map(|path| -> Result<ComposeProject> {
                let content = read(&path)?;
                ComposeProject::load(file_name(&path), &content, &finder)
            })
            .transpose()?;

        if dockerfile.is_none() && compose.is_none() {
            return Err(DockmodError::config(format!(
                "no Dockerfile or Compose manifest found in {}",
                root.display()
            )));
        }

        tracing::info!(
            root = %root.display(),
            dockerfile = dockerfile.as_ref().map(Dockerfile::filename),
            compose = compose.as_ref().map(ComposeProject::filename),
            "codebase discovered"
        );

        Ok(Self {
            root,
            dockerfile,
            compose,
        })
    }

    /// Builds a codebase from already parsed descriptors.
    #[must_use]
    pub fn from_parts(
        root: impl Into<PathBuf>,
        dockerfile: Option<Dockerfile>,
        compose: Option<ComposeProject>,
    ) -> Self {
        Self {
            root: root.into(),
            dockerfile,
            compose,
        }
    }

    /// Returns the codebase root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the Dockerfile, if any.
    pub const fn dockerfile(&self) -> Option<&Dockerfile> {
        self.dockerfile.as_ref()
    }

    /// Returns the Compose project, if any.
    pub const fn compose(&self) -> Option<&ComposeProject> {
        self.compose.as_ref()
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| DockmodError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
