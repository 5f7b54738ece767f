//! The `Compose` object: one function per service plus `All`.

pub mod all;
pub mod service;
pub mod session;

use std::sync::Arc;

use dockmod_common::error::Result;
use dockmod_common::types::DirectoryId;
use dockmod_descriptor::compose::ComposeProject;
use dockmod_engine::engine::ContainerEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::object::{FunctionMap, InputArgs, Object, State, load_directory, lookup};
use crate::schema::{ModuleSchema, ObjectDef};

/// Serialized fields of a `Compose` instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeState {
    /// Directory volumes and build contexts are resolved against.
    #[serde(default)]
    pub dir: Option<DirectoryId>,
}

impl ComposeState {
    /// Returns the project directory, defaulting to the codebase root.
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

/// The `Compose` object.
pub struct ComposeObject {
    functions: FunctionMap<ComposeState>,
}

impl ComposeObject {
    /// Creates the object for `project`, proxying `All` with `proxy_image`.
    pub fn new(project: &Arc<ComposeProject>, proxy_image: &str) -> Self {
        let mut functions: FunctionMap<ComposeState> = FunctionMap::new();
        for service in project.services() {
            let function = service::ServiceFunction::new(Arc::clone(project), service.name());
            let _ = functions.insert(service.name().to_string(), Box::new(function));
        }
        if functions.contains_key("All") {
            tracing::warn!("service named All is shadowed by the aggregate function");
        }
        let all = all::AllFunction::new(Arc::clone(project), proxy_image);
        let _ = functions.insert("All".to_string(), Box::new(all));
        Self { functions }
    }
}

impl Object for ComposeObject {
    fn name(&self) -> &str {
        "Compose"
    }

    fn description(&self) -> &str {
        "Manage compose services"
    }

    fn add_type_def(&self, engine: &dyn ContainerEngine, schema: &mut ModuleSchema) {
        let mut object = ObjectDef::new(self.name(), self.description());
        for function in self.functions.values() {
            object = object.with_function(function.type_def(engine, schema));
        }
        schema.add_object(object);
    }

    fn new_state(&self, engine: &dyn ContainerEngine, input: &InputArgs) -> Result<State> {
        let dir = load_directory(engine, input, "dir", ".")?;
        State::from_value(&ComposeState { dir: Some(dir) })
    }

    fn invoke(
        &self,
        engine: &dyn ContainerEngine,
        state: &State,
        function: &str,
        input: &InputArgs,
    ) -> Result<Value> {
        let function = lookup(&self.functions, self.name(), function)?;
        let state: ComposeState = state.load()?;
        function.invoke(engine, &state, input)
    }
}
