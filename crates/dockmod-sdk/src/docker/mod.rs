//! The `Docker` root object.
//!
//! Exposes `Build` when the codebase has a Dockerfile and `Compose` when it
//! has a Compose manifest.

pub mod build;
pub mod compose;

use std::sync::Arc;

use dockmod_common::error::Result;
use dockmod_common::types::DirectoryId;
use dockmod_descriptor::compose::ComposeProject;
use dockmod_descriptor::dockerfile::Dockerfile;
use dockmod_engine::engine::ContainerEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::object::{FunctionMap, InputArgs, Object, State, load_directory, lookup};
use crate::schema::{ModuleSchema, ObjectDef};

/// Serialized fields of a `Docker` instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerState {
    /// Build context directory.
    #[serde(default)]
    pub dir: Option<DirectoryId>,
}

impl DockerState {
    /// Returns the build context, defaulting to the codebase root.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the codebase root cannot be loaded.
    pub fn directory(&self, engine: &dyn ContainerEngine) -> Result<DirectoryId> {
        self.dir
            .clone()
            .map_or_else(|| engine.host_directory("."), Ok)
    }
}

/// The `Docker` object.
pub struct DockerObject {
    name: String,
    functions: FunctionMap<DockerState>,
}

impl DockerObject {
    /// Creates an object without functions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: FunctionMap::new(),
        }
    }

    /// Adds the `Build` function for `dockerfile`.
    #[must_use]
    pub fn with_dockerfile(mut self, dockerfile: Dockerfile) -> Self {
        let build = build::BuildFunction::new(&self.name, dockerfile);
        let _ = self.functions.insert("Build".to_string(), Box::new(build));
        self
    }

    /// Adds the `Compose` function for `project`.
    #[must_use]
    pub fn with_compose(mut self, project: Arc<ComposeProject>) -> Self {
        let compose = compose::ComposeFunction::new(project);
        let _ = self.functions.insert("Compose".to_string(), Box::new(compose));
        self
    }
}

impl Object for DockerObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Execute docker function"
    }

    fn add_type_def(&self, engine: &dyn ContainerEngine, schema: &mut ModuleSchema) {
        let mut object = ObjectDef::new(&self.name, self.description());
        for function in self.functions.values() {
            object = object.with_function(function.type_def(engine, schema));
        }
        schema.add_object(object);
    }

    fn new_state(&self, engine: &dyn ContainerEngine, input: &InputArgs) -> Result<State> {
        let dir = load_directory(engine, input, "dir", ".")?;
        State::from_value(&DockerState { dir: Some(dir) })
    }

    fn invoke(
        &self,
        engine: &dyn ContainerEngine,
        state: &State,
        function: &str,
        input: &InputArgs,
    ) -> Result<Value> {
        let function = lookup(&self.functions, &self.name, function)?;
        let state: DockerState = state.load()?;
        function.invoke(engine, &state, input)
    }
}
