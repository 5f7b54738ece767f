//! Normalized view of a single Compose service.

use std::collections::BTreeMap;

use dockmod_common::error::{DockmodError, Result};
use serde::{Deserialize, Serialize};

use super::manifest::{BuildSpec, PortSpec, Scalar, ServiceSpec, VolumeSpec};
use super::path::resolve_project_path;
use super::source::Source;
use super::volume::{Cache, Volume, base_name};
use crate::finder::Finder;

pub use dockmod_common::types::Protocol;

/// A port of a service container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    /// Port inside the container.
    pub target: u16,
    /// Port published to the outside, if any.
    pub published: Option<u16>,
    /// Transport protocol.
    pub protocol: Protocol,
}

/// A service of a Compose project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    name: String,
    container_name: Option<String>,
    source: Source,
    workdir: Option<String>,
    ports: Vec<Port>,
    environment: BTreeMap<String, Option<String>>,
    mounted_secrets: Vec<String>,
    volumes: Vec<Volume>,
    caches: Vec<Cache>,
    direct_dependencies: Vec<String>,
    depends_on: Vec<String>,
    entrypoint: Option<Vec<String>>,
    command: Option<Vec<String>>,
}

impl Service {
    /// Normalizes a raw service entry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the service has neither `image` nor
    /// `build`, or a port cannot be parsed.
    pub fn from_spec(name: &str, spec: &ServiceSpec, finder: &Finder) -> Result<Self> {
        let source = resolve_source(name, spec)?;

        let mut ports = Vec::new();
        for port in &spec.ports {
            if let Some(p) = parse_port(name, port)? {
                ports.push(p);
            }
        }
        for expose in &spec.expose {
            let rendered = expose.render();
            let (number, protocol) = split_protocol(&rendered);
            ports.push(Port {
                target: parse_port_number(name, number)?,
                published: None,
                protocol,
            });
        }

        let (volumes, caches) = classify_volumes(name, &spec.volumes, finder);

        Ok(Self {
            name: name.to_string(),
            container_name: spec.container_name.clone(),
            source,
            workdir: spec.working_dir.clone().filter(|w| !w.is_empty()),
            ports: dedup_ports(ports),
            environment: spec
                .environment
                .as_ref()
                .map(super::manifest::EnvironmentSpec::to_map)
                .unwrap_or_default(),
            mounted_secrets: spec.secrets.iter().map(|s| s.name().to_string()).collect(),
            volumes,
            caches,
            direct_dependencies: spec
                .depends_on
                .as_ref()
                .map(super::manifest::DependsOnSpec::names)
                .unwrap_or_default(),
            depends_on: Vec::new(),
            entrypoint: spec.entrypoint.as_ref().map(super::manifest::CommandSpec::to_args),
            command: spec.command.as_ref().map(super::manifest::CommandSpec::to_args),
        })
    }

    /// Returns the service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the container name, falling back to the service name.
    pub fn container_name(&self) -> &str {
        self.container_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the container source.
    pub const fn source(&self) -> &Source {
        &self.source
    }

    /// Returns the working directory override.
    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }

    /// Returns every known container port, deduplicated and sorted.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.ports.iter().map(|p| p.target).collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    /// Returns the full port declarations.
    pub fn port_specs(&self) -> &[Port] {
        &self.ports
    }

    /// Returns the ports published to the outside world.
    pub fn published_ports(&self) -> Vec<Port> {
        self.ports
            .iter()
            .filter(|p| p.published.is_some())
            .copied()
            .collect()
    }

    /// Returns the ports fronted by a proxy: published ports keep their
    /// published number, `expose`-only ports are published as themselves.
    ///
    /// Ports merged in by [`Self::with_discovered_ports`] are routed too, so
    /// callers wanting the manifest's view must ask the unmerged service.
    pub fn routed_ports(&self) -> Vec<Port> {
        self.ports
            .iter()
            .map(|p| Port {
                published: p.published.or(Some(p.target)),
                ..*p
            })
            .collect()
    }

    /// Returns whether the service publishes at least one port.
    pub fn is_exposed(&self) -> bool {
        self.ports.iter().any(|p| p.published.is_some())
    }

    /// Returns a copy of the service with ports discovered on the built
    /// image merged into its port set.
    #[must_use]
    pub fn with_discovered_ports(&self, discovered: &[u16]) -> Self {
        let mut service = self.clone();
        service.ports.extend(discovered.iter().map(|&target| Port {
            target,
            published: None,
            protocol: Protocol::Tcp,
        }));
        service.ports = dedup_ports(service.ports);
        service
    }

    /// Splits the environment into plain variables (with their value) and
    /// secret-backed variable names (declared without value).
    pub fn environment(&self) -> (BTreeMap<String, String>, Vec<String>) {
        let mut plain = BTreeMap::new();
        let mut secrets = Vec::new();
        for (key, value) in &self.environment {
            match value {
                Some(v) => {
                    let _ = plain.insert(key.clone(), v.clone());
                }
                None => secrets.push(key.clone()),
            }
        }
        (plain, secrets)
    }

    /// Returns the names of secrets mounted under `/run/secrets`.
    pub fn mounted_secrets(&self) -> &[String] {
        &self.mounted_secrets
    }

    /// Returns host-backed volumes and engine-managed caches.
    pub fn volumes(&self) -> (&[Volume], &[Cache]) {
        (&self.volumes, &self.caches)
    }

    /// Returns the dependencies declared on this service.
    pub fn direct_dependencies(&self) -> &[String] {
        &self.direct_dependencies
    }

    /// Returns the transitive closure of the service's dependencies.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub(crate) fn set_depends_on(&mut self, closure: Vec<String>) {
        self.depends_on = closure;
    }

    /// Returns the entrypoint override.
    pub fn entrypoint(&self) -> Option<&[String]> {
        self.entrypoint.as_deref()
    }

    /// Returns the default command override.
    pub fn command(&self) -> Option<&[String]> {
        self.command.as_deref()
    }
}

fn resolve_source(name: &str, spec: &ServiceSpec) -> Result<Source> {
    if let Some(reference) = &spec.image {
        return Ok(Source::Image {
            reference: reference.clone(),
        });
    }

    match &spec.build {
        Some(BuildSpec::Context(context)) => Ok(Source::Dockerfile {
            context: resolve_project_path(context),
            dockerfile: "Dockerfile".to_string(),
            build_args: BTreeMap::new(),
            target: None,
        }),
        Some(BuildSpec::Long(build)) => Ok(Source::Dockerfile {
            context: resolve_project_path(build.context.as_deref().unwrap_or(".")),
            dockerfile: build
                .dockerfile
                .clone()
                .unwrap_or_else(|| "Dockerfile".to_string()),
            build_args: build
                .args
                .as_ref()
                .map(super::manifest::EnvironmentSpec::to_map)
                .unwrap_or_default(),
            target: build.target.clone(),
        }),
        None => Err(DockmodError::config(format!(
            "service {name} has neither an image nor a build section"
        ))),
    }
}

fn split_protocol(raw: &str) -> (&str, Protocol) {
    match raw.rsplit_once('/') {
        Some((rest, "udp")) => (rest, Protocol::Udp),
        Some((rest, _)) => (rest, Protocol::Tcp),
        None => (raw, Protocol::Tcp),
    }
}

fn parse_port_number(service: &str, raw: &str) -> Result<u16> {
    raw.trim().parse::<u16>().map_err(|_| {
        DockmodError::config(format!("service {service} declares an invalid port: {raw}"))
    })
}

/// Parses a port entry. Port ranges are not supported and are skipped.
fn parse_port(service: &str, spec: &PortSpec) -> Result<Option<Port>> {
    match spec {
        PortSpec::Long(long) => {
            let published = long
                .published
                .as_ref()
                .map(|p| parse_port_number(service, &p.render()))
                .transpose()?;
            let protocol = match long.protocol.as_deref() {
                Some("udp") => Protocol::Udp,
                _ => Protocol::Tcp,
            };
            Ok(Some(Port {
                target: long.target,
                published,
                protocol,
            }))
        }
        PortSpec::Short(Scalar::Int(port)) => {
            let target = u16::try_from(*port).map_err(|_| {
                DockmodError::config(format!("service {service} declares an invalid port: {port}"))
            })?;
            Ok(Some(Port {
                target,
                published: Some(target),
                protocol: Protocol::Tcp,
            }))
        }
        PortSpec::Short(other) => {
            let rendered = other.render();
            let (mapping, protocol) = split_protocol(&rendered);
            if mapping.contains('-') {
                tracing::warn!(service, port = %rendered, "port ranges are not supported; skipping");
                return Ok(None);
            }

            let mut parts = mapping.rsplitn(3, ':');
            let target = parse_port_number(service, parts.next().unwrap_or_default())?;
            let published = match parts.next() {
                Some(p) if !p.is_empty() => parse_port_number(service, p)?,
                _ => target,
            };
            Ok(Some(Port {
                target,
                published: Some(published),
                protocol,
            }))
        }
    }
}

fn dedup_ports(mut ports: Vec<Port>) -> Vec<Port> {
    ports.sort();
    ports.dedup();
    // An exposed-only entry is redundant next to a published one.
    let published: Vec<(u16, Protocol)> = ports
        .iter()
        .filter(|p| p.published.is_some())
        .map(|p| (p.target, p.protocol))
        .collect();
    ports.retain(|p| p.published.is_some() || !published.contains(&(p.target, p.protocol)));
    ports
}

/// Splits volume entries into host-backed volumes and caches.
///
/// A bind mount whose origin cannot be found in the codebase degrades to
/// a cache named after the origin's base name.
fn classify_volumes(service: &str, specs: &[VolumeSpec], finder: &Finder) -> (Vec<Volume>, Vec<Cache>) {
    let mut volumes = Vec::new();
    let mut caches = Vec::new();

    for spec in specs {
        let (kind, source, target) = match spec {
            VolumeSpec::Short(raw) => {
                let mut parts = raw.split(':');
                let first = parts.next().unwrap_or_default().to_string();
                match parts.next() {
                    Some(target) => {
                        let kind = if is_bind_path(&first) { "bind" } else { "volume" };
                        (kind.to_string(), Some(first), target.to_string())
                    }
                    None => ("volume".to_string(), None, first),
                }
            }
            VolumeSpec::Long(long) => (
                long.kind.clone().unwrap_or_else(|| "volume".to_string()),
                long.source.clone(),
                long.target.clone(),
            ),
        };

        match (kind.as_str(), source) {
            ("bind", Some(source)) => {
                let origin = resolve_project_path(&source);
                match finder.is_path_directory(&origin) {
                    Ok(is_dir) => volumes.push(Volume::new(origin, target, is_dir)),
                    Err(e) => {
                        tracing::debug!(service, origin = %origin, error = %e, "bind mount origin not found; using a cache");
                        caches.push(Cache::new(base_name(&origin), target));
                    }
                }
            }
            (_, Some(name)) => caches.push(Cache::new(name, target)),
            (_, None) => caches.push(Cache::new(anonymous_cache_name(service, &target), target)),
        }
    }

    (disambiguate(service, volumes), caches)
}

/// Volumes whose origins share a base name are renamed after their whole
/// origin path so each one reads its own argument.
fn disambiguate(service: &str, volumes: Vec<Volume>) -> Vec<Volume> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for volume in &volumes {
        *counts.entry(volume.name().to_string()).or_default() += 1;
    }
    volumes
        .into_iter()
        .map(|volume| {
            if counts.get(volume.name()).copied().unwrap_or_default() > 1 {
                let renamed = volume.with_path_name();
                tracing::debug!(
                    service,
                    volume = renamed.name(),
                    "volume base name is shared; using its path"
                );
                renamed
            } else {
                volume
            }
        })
        .collect()
}

fn is_bind_path(source: &str) -> bool {
    source.starts_with('.') || source.starts_with('/') || source.starts_with('~')
}

fn anonymous_cache_name(service: &str, target: &str) -> String {
    let suffix: String = target
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{service}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(yaml: &str, finder: &Finder) -> Result<Service> {
        let spec: ServiceSpec = serde_yaml::from_str(yaml).unwrap();
        Service::from_spec("svc", &spec, finder)
    }

    fn empty_finder() -> (tempfile::TempDir, Finder) {
        let dir = tempfile::tempdir().unwrap();
        let finder = Finder::new(dir.path()).unwrap();
        (dir, finder)
    }

    #[test]
    fn image_takes_precedence_over_build() {
        let (_dir, finder) = empty_finder();
        let svc = service("image: redis:7\nbuild: .", &finder).unwrap();
        assert_eq!(svc.source().image(), Some("redis:7"));
    }

    #[test]
    fn build_long_form_is_normalized() {
        let (_dir, finder) = empty_finder();
        let svc = service(
            "build:\n  context: ./api\n  dockerfile: Dockerfile.dev\n  args: [VERSION=2, DEBUG]\n  target: dev",
            &finder,
        )
        .unwrap();
        match svc.source() {
            Source::Dockerfile {
                context,
                dockerfile,
                build_args,
                target,
            } => {
                assert_eq!(context, "./api");
                assert_eq!(dockerfile, "Dockerfile.dev");
                assert_eq!(build_args.get("VERSION"), Some(&Some("2".to_string())));
                assert_eq!(build_args.get("DEBUG"), Some(&None));
                assert_eq!(target.as_deref(), Some("dev"));
            }
            Source::Image { .. } => panic!("expected a Dockerfile source"),
        }
    }

    #[test]
    fn missing_source_is_a_configuration_error() {
        let (_dir, finder) = empty_finder();
        let err = service("working_dir: /app", &finder).unwrap_err();
        assert!(err.to_string().contains("neither an image nor a build"));
    }

    #[test]
    fn ports_merge_published_exposed_and_discovered() {
        let (_dir, finder) = empty_finder();
        let svc = service(
            "image: web\nports: [\"8080:80\", \"127.0.0.1:9000:9000/udp\", 3000]\nexpose: [\"80\", 9229]",
            &finder,
        )
        .unwrap();
        assert_eq!(svc.ports(), vec![80, 3000, 9000, 9229]);

        let svc = svc.with_discovered_ports(&[80, 443]);
        assert_eq!(svc.ports(), vec![80, 443, 3000, 9000, 9229]);

        let published = svc.published_ports();
        assert_eq!(published.len(), 3);
        assert!(published.iter().any(|p| p.target == 80 && p.published == Some(8080)));
        assert!(
            published
                .iter()
                .any(|p| p.target == 9000 && p.protocol == Protocol::Udp)
        );
    }

    #[test]
    fn expose_only_ports_are_routed_as_themselves() {
        let (_dir, finder) = empty_finder();
        let svc = service("image: web\nports: [\"8080:80\"]\nexpose: [\"9229\"]", &finder).unwrap();
        let routed = svc.routed_ports();
        assert_eq!(routed.len(), 2);
        assert!(routed.iter().any(|p| p.target == 80 && p.published == Some(8080)));
        assert!(routed.iter().any(|p| p.target == 9229 && p.published == Some(9229)));

        let bare = service("image: postgres", &finder).unwrap();
        assert!(bare.routed_ports().is_empty());
    }

    #[test]
    fn port_ranges_are_skipped() {
        let (_dir, finder) = empty_finder();
        let svc = service("image: web\nports: [\"8000-8010:8000-8010\"]", &finder).unwrap();
        assert!(svc.ports().is_empty());
    }

    #[test]
    fn environment_splits_plain_and_secret_backed() {
        let (_dir, finder) = empty_finder();
        let svc = service(
            "image: api\nenvironment:\n  LOG_LEVEL: debug\n  API_TOKEN:\n",
            &finder,
        )
        .unwrap();
        let (plain, secrets) = svc.environment();
        assert_eq!(plain.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert_eq!(secrets, vec!["API_TOKEN"]);
    }

    #[test]
    fn existing_bind_mount_is_a_volume() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("nginx.conf"), "").unwrap();
        let finder = Finder::new(dir.path()).unwrap();

        let svc = service(
            "image: web\nvolumes:\n  - ./src:/app/src\n  - type: bind\n    source: ./nginx.conf\n    target: /etc/nginx/nginx.conf",
            &finder,
        )
        .unwrap();
        let (volumes, caches) = svc.volumes();
        assert!(caches.is_empty());
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].origin(), "./src");
        assert!(volumes[0].is_dir());
        assert!(!volumes[1].is_dir());
    }

    #[test]
    fn volumes_sharing_a_base_name_are_named_by_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/config")).unwrap();
        std::fs::create_dir_all(dir.path().join("b/config")).unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let finder = Finder::new(dir.path()).unwrap();

        let svc = service(
            "image: web\nvolumes: [\"./a/config:/etc/a\", \"./b/config:/etc/b\", \"./data:/data\"]",
            &finder,
        )
        .unwrap();
        let names: Vec<&str> = svc.volumes().0.iter().map(Volume::name).collect();
        assert_eq!(names, vec!["a-config", "b-config", "data"]);
    }

    #[test]
    fn missing_bind_mount_degrades_to_cache() {
        let (_dir, finder) = empty_finder();
        let svc = service(
            "image: web\nvolumes: [\"./node_modules:/app/node_modules\", \"pgdata:/var/lib/postgresql/data\", \"/tmp/cache\"]",
            &finder,
        )
        .unwrap();
        let (volumes, caches) = svc.volumes();
        assert!(volumes.is_empty());
        let names: Vec<&str> = caches.iter().map(Cache::name).collect();
        assert_eq!(names, vec!["node_modules", "pgdata", "svc-tmp-cache"]);
        assert_eq!(caches[0].path(), "/app/node_modules");
    }

    #[test]
    fn container_name_falls_back_to_service_name() {
        let (_dir, finder) = empty_finder();
        let svc = service("image: web", &finder).unwrap();
        assert_eq!(svc.container_name(), "svc");
        let svc = service("image: web\ncontainer_name: web-1", &finder).unwrap();
        assert_eq!(svc.container_name(), "web-1");
    }
}
