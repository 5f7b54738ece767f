//! `Compose.All`: start every service behind a single reverse proxy.

use std::sync::Arc;

use dockmod_common::error::Result;
use dockmod_descriptor::compose::ComposeProject;
use dockmod_engine::engine::ContainerEngine;
use serde_json::Value;

use super::ComposeState;
use super::service::service_arguments;
use super::session::{ArgumentScope, ResolutionSession};
use crate::naming::prefixed_arg_name;
use crate::object::{Function, InputArgs, container_result};
use crate::proxy::{Proxy, Route};
use crate::schema::{FunctionDef, ModuleSchema, TypeDef};

/// Materializes all services and returns the proxy fronting the ports
/// their manifest publishes or exposes.
pub struct AllFunction {
    project: Arc<ComposeProject>,
    proxy_image: String,
}

impl AllFunction {
    /// Creates the function for `project`, proxying with `proxy_image`.
    pub fn new(project: Arc<ComposeProject>, proxy_image: impl Into<String>) -> Self {
        Self {
            project,
            proxy_image: proxy_image.into(),
        }
    }
}

impl Function<ComposeState> for AllFunction {
    fn type_def(&self, _engine: &dyn ContainerEngine, _schema: &mut ModuleSchema) -> FunctionDef {
        let names: Vec<&str> = self.project.services().map(|s| s.name()).collect();
        let mut def = FunctionDef::new("All", TypeDef::object("Container")).with_description(
            format!("Start all service containers ({})", names.join(", ")),
        );
        for service in self.project.services() {
            def = def.with_args(
                service_arguments(service)
                    .iter()
                    .map(|arg| arg.renamed(prefixed_arg_name(service.name(), &arg.name))),
            );
        }
        def
    }

    fn invoke(
        &self,
        engine: &dyn ContainerEngine,
        state: &ComposeState,
        input: &InputArgs,
    ) -> Result<Value> {
        let mut session = ResolutionSession::new(state.directory(engine)?);
        for name in self.project.start_order() {
            let _ = session.materialize(
                engine,
                &self.project,
                name,
                ArgumentScope::Aggregate,
                input,
            )?;
        }

        let mut proxy = Proxy::new(engine, &self.proxy_image)?;
        for name in session.order() {
            let Some(running) = session.running(name) else {
                continue;
            };
            // Ports discovered on the image stay internal; only the
            // manifest's published and expose entries are fronted.
            for port in self.project.get_service(name)?.routed_ports() {
                let Some(frontend) = port.published else {
                    continue;
                };
                let route = Route {
                    name: name.clone(),
                    frontend,
                    backend: port.target,
                    protocol: port.protocol,
                };
                proxy = proxy.with_route(&route, &running.container);
            }
        }

        tracing::info!(
            services = ?session.order(),
            image = %self.proxy_image,
            "all services ready behind proxy"
        );
        container_result(&proxy.into_container())
    }
}
