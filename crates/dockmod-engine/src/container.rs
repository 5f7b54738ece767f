//! Immutable container handles.
//!
//! A [`Container`] describes how a container is assembled: its source and
//! every layer of configuration applied on top. Each `with_*` method
//! consumes the handle and returns a new one, so a handle can be shared and
//! extended without affecting earlier copies.

use std::collections::BTreeMap;

use dockmod_common::types::{ContainerId, DirectoryId, FileId, Platform, Protocol, SecretId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::to_hex;

/// Where a container's root filesystem comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerSource {
    /// A published image.
    Image {
        /// Image reference.
        reference: String,
    },
    /// A Dockerfile build of an engine directory.
    Build {
        /// Build context.
        context: DirectoryId,
        /// Options passed to the build.
        options: BuildOptions,
    },
}

/// Options of a Dockerfile build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Dockerfile path relative to the context.
    pub dockerfile: Option<String>,
    /// Build arguments.
    pub build_args: BTreeMap<String, String>,
    /// Secrets made available to `RUN --mount=type=secret` steps.
    pub secrets: Vec<SecretId>,
    /// Target stage.
    pub target: Option<String>,
    /// Target platform.
    pub platform: Option<Platform>,
}

/// A mount attached to a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mount {
    /// An engine directory.
    Directory {
        /// Path inside the container.
        target: String,
        /// Mounted directory.
        source: DirectoryId,
        /// `user:group` owning the mount.
        owner: Option<String>,
    },
    /// A single engine file.
    File {
        /// Path inside the container.
        target: String,
        /// Mounted file.
        source: FileId,
        /// `user:group` owning the mount.
        owner: Option<String>,
    },
    /// A named cache volume persisted by the engine.
    Cache {
        /// Path inside the container.
        target: String,
        /// Cache volume name.
        volume: String,
        /// `user:group` owning the mount.
        owner: Option<String>,
    },
    /// A secret exposed as a file.
    Secret {
        /// Path inside the container.
        target: String,
        /// Mounted secret.
        secret: SecretId,
    },
}

impl Mount {
    /// Returns the path the mount is attached at.
    pub fn target(&self) -> &str {
        match self {
            Self::Directory { target, .. }
            | Self::File { target, .. }
            | Self::Cache { target, .. }
            | Self::Secret { target, .. } => target,
        }
    }
}

/// An environment variable backed by a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVariable {
    /// Variable name.
    pub name: String,
    /// Secret providing the value.
    pub secret: SecretId,
}

/// A file written into the container filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    /// Absolute path of the file.
    pub path: String,
    /// File contents.
    pub contents: String,
}

/// A port exposed by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExposedPort {
    /// Port number.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

/// Another container reachable under a host alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    /// Host name the service is reachable at.
    pub alias: String,
    /// Handle of the bound container.
    pub container: ContainerId,
}

/// An immutable container handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    source: ContainerSource,
    workdir: Option<String>,
    env: BTreeMap<String, String>,
    secret_env: Vec<SecretVariable>,
    mounts: Vec<Mount>,
    files: Vec<NewFile>,
    exposed_ports: Vec<ExposedPort>,
    service_bindings: Vec<ServiceBinding>,
    entrypoint: Option<Vec<String>>,
    default_args: Option<Vec<String>>,
}

impl Container {
    /// Creates a bare handle from a source.
    #[must_use]
    pub const fn from_source(source: ContainerSource) -> Self {
        Self {
            source,
            workdir: None,
            env: BTreeMap::new(),
            secret_env: Vec::new(),
            mounts: Vec::new(),
            files: Vec::new(),
            exposed_ports: Vec::new(),
            service_bindings: Vec::new(),
            entrypoint: None,
            default_args: None,
        }
    }

    /// Creates a bare handle from an image reference.
    #[must_use]
    pub fn from_image(reference: impl Into<String>) -> Self {
        Self::from_source(ContainerSource::Image {
            reference: reference.into(),
        })
    }

    /// Returns the content address of the handle.
    ///
    /// Two handles assembled the same way always share an id.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        let digest = Sha256::digest(format!("{self:?}").as_bytes());
        ContainerId::new(format!("sha256:{}", to_hex(&digest)))
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_workdir(mut self, path: impl Into<String>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    /// Sets an environment variable, replacing any previous value.
    ///
    /// With `expand`, `$NAME` and `${NAME}` references are replaced by the
    /// value the container already holds (empty when unset).
    #[must_use]
    pub fn with_env_variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        expand: bool,
    ) -> Self {
        let value = value.into();
        let value = if expand {
            expand_variables(&value, &self.env)
        } else {
            value
        };
        let _ = self.env.insert(name.into(), value);
        self
    }

    /// Sets an environment variable from a secret.
    #[must_use]
    pub fn with_secret_variable(mut self, name: impl Into<String>, secret: SecretId) -> Self {
        let name = name.into();
        self.secret_env.retain(|v| v.name != name);
        self.secret_env.push(SecretVariable { name, secret });
        self
    }

    /// Mounts a secret as a file at `path`.
    #[must_use]
    pub fn with_mounted_secret(self, path: impl Into<String>, secret: SecretId) -> Self {
        self.with_mount(Mount::Secret {
            target: path.into(),
            secret,
        })
    }

    /// Mounts an engine directory at `path`.
    #[must_use]
    pub fn with_mounted_directory(
        self,
        path: impl Into<String>,
        source: DirectoryId,
        owner: Option<String>,
    ) -> Self {
        self.with_mount(Mount::Directory {
            target: path.into(),
            source,
            owner,
        })
    }

    /// Mounts an engine file at `path`.
    #[must_use]
    pub fn with_mounted_file(
        self,
        path: impl Into<String>,
        source: FileId,
        owner: Option<String>,
    ) -> Self {
        self.with_mount(Mount::File {
            target: path.into(),
            source,
            owner,
        })
    }

    /// Mounts a named cache volume at `path`.
    #[must_use]
    pub fn with_mounted_cache(
        self,
        path: impl Into<String>,
        volume: impl Into<String>,
        owner: Option<String>,
    ) -> Self {
        self.with_mount(Mount::Cache {
            target: path.into(),
            volume: volume.into(),
            owner,
        })
    }

    fn with_mount(mut self, mount: Mount) -> Self {
        self.mounts.retain(|m| m.target() != mount.target());
        self.mounts.push(mount);
        self
    }

    /// Writes a file into the container, replacing any file at `path`.
    #[must_use]
    pub fn with_new_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        let path = path.into();
        self.files.retain(|f| f.path != path);
        self.files.push(NewFile {
            path,
            contents: contents.into(),
        });
        self
    }

    /// Exposes a port.
    #[must_use]
    pub fn with_exposed_port(mut self, port: u16, protocol: Protocol) -> Self {
        let exposed = ExposedPort { port, protocol };
        if !self.exposed_ports.contains(&exposed) {
            self.exposed_ports.push(exposed);
        }
        self
    }

    /// Makes `service` reachable from this container under `alias`.
    #[must_use]
    pub fn with_service_binding(mut self, alias: impl Into<String>, service: &Self) -> Self {
        let alias = alias.into();
        self.service_bindings.retain(|b| b.alias != alias);
        self.service_bindings.push(ServiceBinding {
            alias,
            container: service.id(),
        });
        self
    }

    /// Overrides the image entrypoint.
    #[must_use]
    pub fn with_entrypoint(mut self, args: Vec<String>) -> Self {
        self.entrypoint = Some(args);
        self
    }

    /// Overrides the default arguments passed to the entrypoint.
    #[must_use]
    pub fn with_default_args(mut self, args: Vec<String>) -> Self {
        self.default_args = Some(args);
        self
    }

    /// Returns the container source.
    pub const fn source(&self) -> &ContainerSource {
        &self.source
    }

    /// Returns the working directory.
    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }

    /// Returns the value of an environment variable.
    pub fn env_variable(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Returns all plain environment variables.
    pub const fn env_variables(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns secret-backed environment variables.
    pub fn secret_variables(&self) -> &[SecretVariable] {
        &self.secret_env
    }

    /// Returns all mounts in attachment order.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Returns files written into the container.
    pub fn files(&self) -> &[NewFile] {
        &self.files
    }

    /// Returns the contents of the file written at `path`.
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.contents.as_str())
    }

    /// Returns ports exposed on the handle.
    pub fn exposed_ports(&self) -> &[ExposedPort] {
        &self.exposed_ports
    }

    /// Returns bound services.
    pub fn service_bindings(&self) -> &[ServiceBinding] {
        &self.service_bindings
    }

    /// Returns the entrypoint override.
    pub fn entrypoint(&self) -> Option<&[String]> {
        self.entrypoint.as_deref()
    }

    /// Returns the default arguments override.
    pub fn default_args(&self) -> Option<&[String]> {
        self.default_args.as_deref()
    }
}

/// Replaces `$NAME` and `${NAME}` with values from `env`.
fn expand_variables(value: &str, env: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &value[idx + 1..];
        if let Some(braced) = rest.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                out.push_str(env.get(name).map_or("", String::as_str));
                skip_to(&mut chars, idx + end + 3);
                continue;
            }
        }
        let len = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            out.push('$');
            continue;
        }
        out.push_str(env.get(&rest[..len]).map_or("", String::as_str));
        skip_to(&mut chars, idx + len + 1);
    }
    out
}

/// Advances `chars` until the next char starts at or after byte `stop`.
fn skip_to(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, stop: usize) {
    while chars.next_if(|&(i, _)| i < stop).is_some() {}
}
