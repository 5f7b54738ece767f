//! In-memory engine.
//!
//! Resolves every operation from configured image metadata and records
//! each call, so assembled containers can be inspected without a daemon.

use std::collections::BTreeMap;
use std::sync::Mutex;

use dockmod_common::error::{DockmodError, Result};
use dockmod_common::types::{DirectoryId, FileId, Platform, SecretId};
use sha2::{Digest, Sha256};

use crate::container::{BuildOptions, Container, ContainerSource};
use crate::engine::{ContainerEngine, join_relative, to_hex};

/// Metadata of an image known to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageConfig {
    /// User the image runs as.
    pub user: String,
    /// Ports declared with `EXPOSE`.
    pub exposed_ports: Vec<u16>,
}

/// An operation performed against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// An image was resolved.
    FromImage {
        /// Image reference.
        reference: String,
    },
    /// A Dockerfile was built.
    BuildImage {
        /// Build context.
        context: DirectoryId,
        /// Build options.
        options: BuildOptions,
    },
    /// A secret was registered.
    SetSecret {
        /// Secret name.
        name: String,
    },
}

/// Engine that keeps everything in memory.
#[derive(Debug)]
pub struct MemoryEngine {
    images: BTreeMap<String, ImageConfig>,
    build_config: ImageConfig,
    build_failure: Option<String>,
    platform: Option<Platform>,
    secrets: Mutex<BTreeMap<SecretId, String>>,
    calls: Mutex<Vec<EngineCall>>,
}

impl MemoryEngine {
    /// Creates an engine targeting the host platform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            images: BTreeMap::new(),
            build_config: ImageConfig::default(),
            build_failure: None,
            platform: Some(Platform::host()),
            secrets: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Registers metadata for an image reference.
    #[must_use]
    pub fn with_image(mut self, reference: impl Into<String>, config: ImageConfig) -> Self {
        let _ = self.images.insert(reference.into(), config);
        self
    }

    /// Sets the metadata reported for every built image.
    #[must_use]
    pub fn with_build_config(mut self, config: ImageConfig) -> Self {
        self.build_config = config;
        self
    }

    /// Makes every build fail with `message`.
    #[must_use]
    pub fn with_build_failure(mut self, message: impl Into<String>) -> Self {
        self.build_failure = Some(message.into());
        self
    }

    /// Sets the default platform, or makes it unavailable with `None`.
    #[must_use]
    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    /// Stores a secret under a caller-chosen id.
    #[must_use]
    pub fn with_secret(self, id: impl Into<String>, plaintext: impl Into<String>) -> Self {
        if let Ok(mut secrets) = self.secrets.lock() {
            let _ = secrets.insert(SecretId::new(id), plaintext.into());
        }
        self
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: EngineCall) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| DockmodError::config("engine call log poisoned"))?
            .push(call);
        Ok(())
    }

    fn image_config(&self, container: &Container) -> ImageConfig {
        match container.source() {
            ContainerSource::Image { reference } => {
                self.images.get(reference).cloned().unwrap_or_default()
            }
            ContainerSource::Build { .. } => self.build_config.clone(),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEngine for MemoryEngine {
    fn from_image(&self, reference: &str) -> Result<Container> {
        tracing::debug!(reference, "resolving image");
        self.record(EngineCall::FromImage {
            reference: reference.to_string(),
        })?;
        Ok(Container::from_image(reference))
    }

    fn build_image(&self, context: &DirectoryId, options: &BuildOptions) -> Result<Container> {
        tracing::debug!(context = %context, ?options, "building image");
        self.record(EngineCall::BuildImage {
            context: context.clone(),
            options: options.clone(),
        })?;
        if let Some(message) = &self.build_failure {
            return Err(DockmodError::execution(message.clone()));
        }
        Ok(Container::from_source(ContainerSource::Build {
            context: context.clone(),
            options: options.clone(),
        }))
    }

    fn user(&self, container: &Container) -> Result<String> {
        Ok(self.image_config(container).user)
    }

    fn exposed_ports(&self, container: &Container) -> Result<Vec<u16>> {
        let mut ports = self.image_config(container).exposed_ports;
        ports.extend(container.exposed_ports().iter().map(|p| p.port));
        ports.sort_unstable();
        ports.dedup();
        Ok(ports)
    }

    fn host_directory(&self, path: &str) -> Result<DirectoryId> {
        Ok(DirectoryId::new(join_relative("host:/", path)))
    }

    fn host_file(&self, path: &str) -> Result<FileId> {
        Ok(FileId::new(join_relative("host:/", path)))
    }

    fn subdirectory(&self, dir: &DirectoryId, path: &str) -> Result<DirectoryId> {
        Ok(DirectoryId::new(join_relative(dir.as_str(), path)))
    }

    fn secret_plaintext(&self, secret: &SecretId) -> Result<String> {
        self.secrets
            .lock()
            .map_err(|_| DockmodError::config("secret store poisoned"))?
            .get(secret)
            .cloned()
            .ok_or_else(|| DockmodError::not_found("secret", secret.as_str()))
    }

    fn set_secret(&self, name: &str, plaintext: &str) -> Result<SecretId> {
        self.record(EngineCall::SetSecret {
            name: name.to_string(),
        })?;
        let digest = Sha256::digest(plaintext.as_bytes());
        let id = SecretId::new(format!("mem://{name}/{}", to_hex(&digest[..6])));
        let _ = self
            .secrets
            .lock()
            .map_err(|_| DockmodError::config("secret store poisoned"))?
            .insert(id.clone(), plaintext.to_string());
        Ok(id)
    }

    fn default_platform(&self) -> Result<Platform> {
        self.platform
            .clone()
            .ok_or_else(|| DockmodError::execution("engine did not report a default platform"))
    }
}

#[cfg(test)]
mod tests {
    use dockmod_common::types::Protocol;

    use super::*;

    #[test]
    fn image_metadata_drives_user_and_ports() {
        let engine = MemoryEngine::new().with_image(
            "postgres:16",
            ImageConfig {
                user: "postgres".into(),
                exposed_ports: vec![5432],
            },
        );
        let ctr = engine
            .from_image("postgres:16")
            .unwrap()
            .with_exposed_port(9187, Protocol::Tcp);
        assert_eq!(engine.user(&ctr).unwrap(), "postgres");
        assert_eq!(engine.exposed_ports(&ctr).unwrap(), vec![5432, 9187]);
    }

    #[test]
    fn unknown_image_runs_as_root_without_ports() {
        let engine = MemoryEngine::new();
        let ctr = engine.from_image("alpine").unwrap();
        assert_eq!(engine.user(&ctr).unwrap(), "");
        assert!(engine.exposed_ports(&ctr).unwrap().is_empty());
    }

    #[test]
    fn build_failure_is_an_execution_error() {
        let engine = MemoryEngine::new().with_build_failure("exit code: 1");
        let err = engine
            .build_image(&DirectoryId::new("host:/"), &BuildOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "exit code: 1");
        assert_eq!(engine.calls().len(), 1);
    }

    #[test]
    fn set_secret_round_trips_plaintext() {
        let engine = MemoryEngine::new();
        let id = engine.set_secret("token", "s3cr3t").unwrap();
        assert!(id.as_str().starts_with("mem://token/"));
        assert_eq!(engine.secret_plaintext(&id).unwrap(), "s3cr3t");
        assert!(engine.secret_plaintext(&SecretId::new("mem://nope")).is_err());
    }

    #[test]
    fn directories_are_addressed_relative_to_host_root() {
        let engine = MemoryEngine::new();
        let root = engine.host_directory(".").unwrap();
        assert_eq!(root.as_str(), "host:/");
        let api = engine.subdirectory(&root, "./api").unwrap();
        assert_eq!(api.as_str(), "host:/api");
    }

    #[test]
    fn missing_platform_is_reported() {
        let engine = MemoryEngine::new().with_platform(None);
        assert!(engine.default_platform().is_err());
    }
}
