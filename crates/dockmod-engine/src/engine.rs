//! The seam to the real container build engine.

use std::fmt::Write as _;

use dockmod_common::error::Result;
use dockmod_common::types::{DirectoryId, FileId, Platform, SecretId};

use crate::container::{BuildOptions, Container};

/// Operations Dockmod needs from a container engine.
///
/// Everything else about a container is assembled locally on the
/// immutable [`Container`] handle.
pub trait ContainerEngine: Send + Sync {
    /// Returns a handle for a published image.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the image cannot be resolved.
    fn from_image(&self, reference: &str) -> Result<Container>;

    /// Builds the Dockerfile found in `context`.
    ///
    /// # Errors
    ///
    /// Returns an execution error carrying the engine output if the build
    /// fails.
    fn build_image(&self, context: &DirectoryId, options: &BuildOptions) -> Result<Container>;

    /// Returns the user the container's image runs as (empty for root).
    ///
    /// # Errors
    ///
    /// Returns an error if the image configuration cannot be read.
    fn user(&self, container: &Container) -> Result<String>;

    /// Returns the ports declared by the container's image and handle,
    /// sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if the image configuration cannot be read.
    fn exposed_ports(&self, container: &Container) -> Result<Vec<u16>>;

    /// Returns a directory of the user's codebase.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the path is not a directory.
    fn host_directory(&self, path: &str) -> Result<DirectoryId>;

    /// Returns a file of the user's codebase.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the path is not a file.
    fn host_file(&self, path: &str) -> Result<FileId>;

    /// Returns the directory at `path` below `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot address the subdirectory.
    fn subdirectory(&self, dir: &DirectoryId, path: &str) -> Result<DirectoryId>;

    /// Reads the plaintext of a secret.
    ///
    /// # Errors
    ///
    /// Returns a not found error for unknown secrets.
    fn secret_plaintext(&self, secret: &SecretId) -> Result<String>;

    /// Registers a secret under `name` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the secret.
    fn set_secret(&self, name: &str, plaintext: &str) -> Result<SecretId>;

    /// Returns the platform builds target by default.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot report its platform.
    fn default_platform(&self) -> Result<Platform>;
}

/// Joins `path` below `base`, folding `.` segments and leading `./`.
pub(crate) fn join_relative(base: &str, path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), segments.join("/"))
}

/// Renders bytes as lowercase hex.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
