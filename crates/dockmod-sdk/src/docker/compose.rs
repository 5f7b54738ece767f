//! `Docker.Compose`: hand over to the `Compose` object.

use std::sync::Arc;

use dockmod_common::error::Result;
use dockmod_descriptor::compose::ComposeProject;
use dockmod_engine::engine::ContainerEngine;
use serde_json::Value;

use super::DockerState;
use crate::compose::ComposeState;
use crate::object::{Function, InputArgs};
use crate::schema::{FunctionDef, ModuleSchema, TypeDef};

/// Returns a `Compose` instance sharing the Docker build context.
pub struct ComposeFunction {
    project: Arc<ComposeProject>,
}

impl ComposeFunction {
    /// Creates the function for `project`.
    #[must_use]
    pub const fn new(project: Arc<ComposeProject>) -> Self {
        Self { project }
    }
}

impl Function<DockerState> for ComposeFunction {
    fn type_def(&self, _engine: &dyn ContainerEngine, _schema: &mut ModuleSchema) -> FunctionDef {
        FunctionDef::new("Compose", TypeDef::object("Compose")).with_description(format!(
            "Manage docker compose services ({})",
            self.project.filename()
        ))
    }

    fn invoke(
        &self,
        engine: &dyn ContainerEngine,
        state: &DockerState,
        _input: &InputArgs,
    ) -> Result<Value> {
        let state = ComposeState {
            dir: Some(state.directory(engine)?),
        };
        Ok(serde_json::to_value(state)?)
    }
}
