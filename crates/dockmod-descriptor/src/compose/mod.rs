//! Compose manifest model.
//!
//! Loads a manifest into a [`ComposeProject`] whose services are fully
//! normalized: sources resolved, volumes classified, and dependency sets
//! transitively closed.

pub mod manifest;
pub mod path;
pub mod service;
pub mod source;
pub mod volume;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use dockmod_common::constants::DEFAULT_PROJECT_NAME;
use dockmod_common::error::{DockmodError, Result};

use self::manifest::Manifest;
use self::service::Service;
use crate::finder::Finder;
use crate::graph::DependencyGraph;

/// A parsed Compose project.
#[derive(Debug, Clone)]
pub struct ComposeProject {
    filename: String,
    name: String,
    services: BTreeMap<String, Service>,
    start_order: Vec<String>,
}

impl ComposeProject {
    /// Parses and normalizes a Compose manifest.
    ///
    /// # Errors
    ///
    /// Returns a parse error for invalid YAML, a configuration error for a
    /// service without source or with a cyclic `depends_on`, and a not
    /// found error when a dependency names an unknown service.
    pub fn load(filename: impl Into<String>, content: &[u8], finder: &Finder) -> Result<Self> {
        let filename = filename.into();
        tracing::info!(filename = %filename, "loading compose manifest");

        let manifest: Manifest =
            serde_yaml::from_slice(content).map_err(|e| DockmodError::Parse {
                descriptor: filename.clone(),
                message: e.to_string(),
            })?;

        let mut services = BTreeMap::new();
        for (name, spec) in &manifest.services {
            let _ = services.insert(name.clone(), Service::from_spec(name, spec, finder)?);
        }

        let mut graph = DependencyGraph::new();
        for service in services.values() {
            let _ = graph.add_service(service.name());
            for dependency in service.direct_dependencies() {
                if !services.contains_key(dependency) {
                    return Err(DockmodError::not_found(
                        "service",
                        format!("{dependency} (required by {})", service.name()),
                    ));
                }
                graph.add_dependency(service.name(), dependency);
            }
        }
        let start_order = graph.resolve_order()?;

        let closures: BTreeMap<String, Vec<String>> = services
            .keys()
            .map(|name| (name.clone(), dependency_closure(&services, name)))
            .collect();
        for (name, closure) in closures {
            if let Some(service) = services.get_mut(&name) {
                service.set_depends_on(closure);
            }
        }

        tracing::debug!(services = services.len(), ?start_order, "compose manifest loaded");

        Ok(Self {
            filename,
            name: manifest
                .name
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            services,
            start_order,
        })
    }

    /// Returns the manifest file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all services, sorted by name.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// Returns a service by name.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the project has no such service.
    pub fn get_service(&self, name: &str) -> Result<&Service> {
        self.services
            .get(name)
            .ok_or_else(|| DockmodError::not_found("service", name))
    }

    /// Returns service names with dependencies before dependents.
    pub fn start_order(&self) -> &[String] {
        &self.start_order
    }
}

/// Computes the transitive dependencies of `root` with an explicit stack
/// and visited set.
fn dependency_closure(services: &BTreeMap<String, Service>, root: &str) -> Vec<String> {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&str> = services
        .get(root)
        .map(|s| s.direct_dependencies().iter().map(String::as_str).collect())
        .unwrap_or_default();

    while let Some(name) = stack.pop() {
        if name == root || !visited.insert(name.to_string()) {
            continue;
        }
        if let Some(service) = services.get(name) {
            stack.extend(service.direct_dependencies().iter().map(String::as_str));
        }
    }

    visited.into_iter().collect()
}

impl fmt::Display for ComposeProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Project: {} ({})", self.name, self.filename)?;
        for name in &self.start_order {
            let Some(service) = self.services.get(name) else {
                continue;
            };
            writeln!(f, "Service: {name}")?;
            match service.source() {
                source::Source::Image { reference } => writeln!(f, "  image: {reference}")?,
                source::Source::Dockerfile {
                    context,
                    dockerfile,
                    ..
                } => writeln!(f, "  build: {context} ({dockerfile})")?,
            }
            let ports: Vec<String> = service.ports().iter().map(u16::to_string).collect();
            if !ports.is_empty() {
                writeln!(f, "  ports: {}", ports.join(", "))?;
            }
            if !service.depends_on().is_empty() {
                writeln!(f, "  depends on: {}", service.depends_on().join(", "))?;
            }
        }
        Ok(())
    }
}
