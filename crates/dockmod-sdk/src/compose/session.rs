//! Per-call bookkeeping of materialized services.

use std::collections::BTreeMap;

use dockmod_common::error::Result;
use dockmod_common::types::DirectoryId;
use dockmod_descriptor::compose::ComposeProject;
use dockmod_descriptor::compose::service::Service;
use dockmod_engine::container::Container;
use dockmod_engine::engine::ContainerEngine;

use super::service::materialize_service;
use crate::naming::prefixed_arg_name;
use crate::object::InputArgs;

/// How a call's arguments are routed to the services it materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentScope<'a> {
    /// A single service function: `root` reads unprefixed arguments and
    /// each dependency reads those prefixed with its name.
    Direct {
        /// Service whose function was called.
        root: &'a str,
    },
    /// The `All` function: every service reads arguments prefixed with its
    /// name.
    Aggregate,
}

impl ArgumentScope<'_> {
    /// Returns the arguments visible to `service`, one of `services`.
    ///
    /// A prefixed argument belongs to the service with the longest matching
    /// prefix: `db_replica_image` goes to `db_replica`, never to `db`.
    #[must_use]
    pub fn arguments_for(&self, services: &[String], service: &str, input: &InputArgs) -> InputArgs {
        match self {
            Self::Direct { root } if *root == service => input.clone(),
            Self::Direct { .. } | Self::Aggregate => {
                let prefix = prefixed_arg_name(service, "");
                let longer: Vec<String> = services
                    .iter()
                    .map(|other| prefixed_arg_name(other, ""))
                    .filter(|other| other.len() > prefix.len() && other.starts_with(&prefix))
                    .collect();
                input.without_prefixes(&longer).strip_prefix(&prefix)
            }
        }
    }
}

/// A service container assembled during the current call.
#[derive(Debug, Clone)]
pub struct RunningService {
    /// The assembled container.
    pub container: Container,
    /// The service with the ports discovered on its image merged in.
    pub service: Service,
}

/// Services materialized during one top-level call, in start order.
#[derive(Debug)]
pub struct ResolutionSession {
    dir: DirectoryId,
    running: BTreeMap<String, RunningService>,
    order: Vec<String>,
}

impl ResolutionSession {
    /// Opens a session resolving volumes and build contexts against `dir`.
    #[must_use]
    pub fn new(dir: DirectoryId) -> Self {
        Self {
            dir,
            running: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Returns the service container, assembling it and its dependencies
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns a not found error for unknown services, otherwise any
    /// decoding, configuration or engine error raised while assembling.
    pub fn materialize(
        &mut self,
        engine: &dyn ContainerEngine,
        project: &ComposeProject,
        name: &str,
        scope: ArgumentScope<'_>,
        input: &InputArgs,
    ) -> Result<Container> {
        if let Some(running) = self.running.get(name) {
            tracing::debug!(service = name, "reusing running service");
            return Ok(running.container.clone());
        }

        let service = project.get_service(name)?;
        for dependency in project.start_order() {
            if service.depends_on().contains(dependency) {
                let _ = self.materialize(engine, project, dependency, scope, input)?;
            }
        }

        tracing::debug!(service = name, "materializing service");
        let args = scope.arguments_for(project.start_order(), name, input);
        let running = materialize_service(engine, &self.dir, service, scope, &args, &self.running)?;
        let container = running.container.clone();
        let _ = self.running.insert(name.to_string(), running);
        self.order.push(name.to_string());
        Ok(container)
    }

    /// Returns a service materialized in this session.
    pub fn running(&self, name: &str) -> Option<&RunningService> {
        self.running.get(name)
    }

    /// Returns service names in the order they were materialized.
    pub fn order(&self) -> &[String] {
        &self.order
    }
}
