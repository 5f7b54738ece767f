//! Engine backed by the local `docker` CLI.
//!
//! Directories and files are host paths below the codebase root. Secrets
//! are read from `env://NAME` and `file://PATH` ids, or registered in
//! memory with [`ContainerEngine::set_secret`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use dockmod_common::error::{DockmodError, Result};
use dockmod_common::types::{DirectoryId, FileId, Platform, SecretId};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::container::{BuildOptions, Container, ContainerSource};
use crate::engine::{ContainerEngine, join_relative, to_hex};

/// Engine that shells out to `docker`.
#[derive(Debug)]
pub struct DockerCliEngine {
    binary: PathBuf,
    root: PathBuf,
    secrets: Mutex<BTreeMap<SecretId, (String, String)>>,
}

/// The subset of `docker image inspect` `.Config` Dockmod reads.
#[derive(Debug, Default, Deserialize)]
struct InspectConfig {
    #[serde(rename = "User", default)]
    user: String,
    #[serde(rename = "ExposedPorts", default)]
    exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
}

impl DockerCliEngine {
    /// Locates the `docker` binary and serves host paths below `root`.
    ///
    /// # Errors
    ///
    /// Returns a not found error if `docker` is not on the `PATH`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let binary = which::which("docker")
            .map_err(|_| DockmodError::not_found("docker binary", "docker (install Docker Engine)"))?;
        tracing::debug!(binary = %binary.display(), "using docker CLI engine");
        Ok(Self {
            binary,
            root: root.into(),
            secrets: Mutex::new(BTreeMap::new()),
        })
    }

    fn run(&self, args: &[String], envs: &[(String, String)]) -> Result<String> {
        tracing::debug!(?args, "running docker");
        let output = Command::new(&self.binary)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|source| DockmodError::Io {
                path: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockmodError::execution(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn inspect(&self, container: &Container) -> Result<InspectConfig> {
        let ContainerSource::Image { reference } = container.source() else {
            return Err(DockmodError::config("container image has not been built"));
        };
        let raw = self.run(
            &[
                "image".into(),
                "inspect".into(),
                "--format".into(),
                "{{json .Config}}".into(),
                reference.clone(),
            ],
            &[],
        )?;
        if raw == "null" {
            return Ok(InspectConfig::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn host_path(&self, path: &str) -> PathBuf {
        PathBuf::from(join_relative(&self.root.to_string_lossy(), path))
    }

    fn secret_entry(&self, secret: &SecretId) -> Result<(String, String)> {
        let id = secret.as_str();
        if let Some(var) = id.strip_prefix("env://") {
            let value = std::env::var(var).map_err(|_| DockmodError::not_found("secret", id))?;
            return Ok((var.to_string(), value));
        }
        if let Some(path) = id.strip_prefix("file://") {
            let value = std::fs::read_to_string(path).map_err(|source| DockmodError::Io {
                path: PathBuf::from(path),
                source,
            })?;
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok((name, value));
        }
        self.secrets
            .lock()
            .map_err(|_| DockmodError::config("secret store poisoned"))?
            .get(secret)
            .cloned()
            .ok_or_else(|| DockmodError::not_found("secret", id))
    }
}

impl ContainerEngine for DockerCliEngine {
    fn from_image(&self, reference: &str) -> Result<Container> {
        tracing::info!(reference, "pulling image");
        let _ = self.run(&["pull".into(), "--quiet".into(), reference.to_string()], &[])?;
        Ok(Container::from_image(reference))
    }

    fn build_image(&self, context: &DirectoryId, options: &BuildOptions) -> Result<Container> {
        let digest = Sha256::digest(format!("{context:?}{options:?}").as_bytes());
        let tag = format!("dockmod-build:{}", to_hex(&digest[..8]));
        tracing::info!(context = %context, tag = %tag, "building image");

        let mut args: Vec<String> = vec!["build".into(), "--tag".into(), tag.clone()];
        if let Some(dockerfile) = &options.dockerfile {
            args.push("--file".into());
            args.push(join_relative(context.as_str(), dockerfile));
        }
        for (key, value) in &options.build_args {
            args.push("--build-arg".into());
            args.push(format!("{key}={value}"));
        }
        if let Some(target) = &options.target {
            args.push("--target".into());
            args.push(target.clone());
        }
        if let Some(platform) = &options.platform {
            args.push("--platform".into());
            args.push(platform.to_string());
        }

        let mut envs = vec![("DOCKER_BUILDKIT".to_string(), "1".to_string())];
        for (idx, secret) in options.secrets.iter().enumerate() {
            let (name, value) = self.secret_entry(secret)?;
            let var = format!("DOCKMOD_BUILD_SECRET_{idx}");
            args.push("--secret".into());
            args.push(format!("id={name},env={var}"));
            envs.push((var, value));
        }
        args.push(context.as_str().to_string());

        let _ = self.run(&args, &envs)?;
        Ok(Container::from_image(tag))
    }

    fn user(&self, container: &Container) -> Result<String> {
        Ok(self.inspect(container)?.user)
    }

    fn exposed_ports(&self, container: &Container) -> Result<Vec<u16>> {
        let config = self.inspect(container)?;
        let mut ports: Vec<u16> = config
            .exposed_ports
            .unwrap_or_default()
            .keys()
            .filter_map(|key| parse_exposed_port_key(key))
            .collect();
        ports.extend(container.exposed_ports().iter().map(|p| p.port));
        ports.sort_unstable();
        ports.dedup();
        Ok(ports)
    }

    fn host_directory(&self, path: &str) -> Result<DirectoryId> {
        let full = self.host_path(path);
        if !full.is_dir() {
            return Err(DockmodError::not_found(
                "directory",
                full.display().to_string(),
            ));
        }
        Ok(DirectoryId::new(full.to_string_lossy()))
    }

    fn host_file(&self, path: &str) -> Result<FileId> {
        let full = self.host_path(path);
        if !full.is_file() {
            return Err(DockmodError::not_found("file", full.display().to_string()));
        }
        Ok(FileId::new(full.to_string_lossy()))
    }

    fn subdirectory(&self, dir: &DirectoryId, path: &str) -> Result<DirectoryId> {
        Ok(DirectoryId::new(join_relative(dir.as_str(), path)))
    }

    fn secret_plaintext(&self, secret: &SecretId) -> Result<String> {
        self.secret_entry(secret).map(|(_, value)| value)
    }

    fn set_secret(&self, name: &str, plaintext: &str) -> Result<SecretId> {
        let id = SecretId::new(format!("mem://{name}"));
        let _ = self
            .secrets
            .lock()
            .map_err(|_| DockmodError::config("secret store poisoned"))?
            .insert(id.clone(), (name.to_string(), plaintext.to_string()));
        Ok(id)
    }

    fn default_platform(&self) -> Result<Platform> {
        let raw = self.run(
            &[
                "version".into(),
                "--format".into(),
                "{{.Server.Os}}/{{.Server.Arch}}".into(),
            ],
            &[],
        )?;
        Ok(Platform::new(raw))
    }
}

/// Parses an `ExposedPorts` key such as `5432/tcp`.
fn parse_exposed_port_key(key: &str) -> Option<u16> {
    key.split('/').next().and_then(|p| p.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(root: &Path) -> DockerCliEngine {
        DockerCliEngine {
            binary: PathBuf::from("docker"),
            root: root.to_path_buf(),
            secrets: Mutex::new(BTreeMap::new()),
        }
    }

    #[test]
    fn exposed_port_keys_are_parsed() {
        assert_eq!(parse_exposed_port_key("5432/tcp"), Some(5432));
        assert_eq!(parse_exposed_port_key("53/udp"), Some(53));
        assert_eq!(parse_exposed_port_key("bogus"), None);
    }

    #[test]
    fn inspect_config_tolerates_missing_fields() {
        let config: InspectConfig =
            serde_json::from_str(r#"{"User":"","ExposedPorts":{"80/tcp":{}}}"#).unwrap();
        assert!(config.user.is_empty());
        assert_eq!(config.exposed_ports.unwrap().len(), 1);
        let config: InspectConfig = serde_json::from_str("{}").unwrap();
        assert!(config.exposed_ports.is_none());
    }

    #[test]
    fn host_paths_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("api")).unwrap();
        std::fs::write(dir.path().join("app.conf"), "x").unwrap();
        let engine = engine(dir.path());

        assert!(engine.host_directory("./api").is_ok());
        assert!(engine.host_directory("./missing").is_err());
        assert!(engine.host_file("./app.conf").is_ok());
        assert!(engine.host_file("./api").is_err());
    }

    #[test]
    fn file_and_registered_secrets_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "abc").unwrap();
        let engine = engine(dir.path());

        let file_id = SecretId::new(format!("file://{}", path.display()));
        assert_eq!(engine.secret_plaintext(&file_id).unwrap(), "abc");

        let id = engine.set_secret("npm", "xyz").unwrap();
        assert_eq!(engine.secret_plaintext(&id).unwrap(), "xyz");
        assert!(engine.secret_plaintext(&SecretId::new("mem://other")).is_err());
    }
}
