//! Object registry and invocation dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use dockmod_common::config::DockmodConfig;
use dockmod_common::error::{DockmodError, Result};
use dockmod_descriptor::codebase::Codebase;
use dockmod_engine::engine::ContainerEngine;
use serde_json::Value;

use crate::compose::ComposeObject;
use crate::docker::DockerObject;
use crate::object::{InputArgs, Object, State};
use crate::protocol::{CallResponse, FunctionCall};
use crate::schema::{FunctionArg, FunctionDef, ModuleSchema, ObjectDef, TypeDef};

/// The module exposed to the orchestrator.
///
/// Holds the objects derived from the codebase descriptors. Nothing is kept
/// between calls: every call carries the state it needs.
pub struct Module {
    name: String,
    engine: Arc<dyn ContainerEngine>,
    objects: BTreeMap<String, Box<dyn Object>>,
    roots: Vec<String>,
}

impl Module {
    /// Builds the module for a discovered codebase.
    pub fn new(
        config: &DockmodConfig,
        codebase: &Codebase,
        engine: Arc<dyn ContainerEngine>,
    ) -> Self {
        let mut module = Self {
            name: config.entrypoint_name(),
            engine,
            objects: BTreeMap::new(),
            roots: Vec::new(),
        };

        let mut docker = DockerObject::new("Docker");
        if let Some(dockerfile) = codebase.dockerfile() {
            docker = docker.with_dockerfile(dockerfile.clone());
        }
        if let Some(project) = codebase.compose() {
            let project = Arc::new(project.clone());
            docker = docker.with_compose(Arc::clone(&project));
            module.register(ComposeObject::new(&project, &config.proxy_image), false);
        }
        module.register(docker, true);

        tracing::info!(
            module = %module.name,
            objects = ?module.objects.keys().collect::<Vec<_>>(),
            "module ready"
        );
        module
    }

    fn register(&mut self, object: impl Object + 'static, root: bool) {
        let name = object.name().to_string();
        if root {
            self.roots.push(name.clone());
        }
        let _ = self.objects.insert(name, Box::new(object));
    }

    /// Returns the entrypoint object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Describes the entrypoint object and every registered object.
    pub fn schema(&self) -> ModuleSchema {
        let mut schema = ModuleSchema::new(&self.name);

        let mut entrypoint = ObjectDef::new(&self.name, format!("{} module", self.name));
        for root in &self.roots {
            let Some(object) = self.objects.get(root) else {
                continue;
            };
            entrypoint = entrypoint.with_function(
                FunctionDef::new(root, TypeDef::object(root.as_str()))
                    .with_description(object.description())
                    .with_arg(
                        FunctionArg::new("dir", TypeDef::object("Directory"))
                            .with_default_path("."),
                    ),
            );
        }
        schema.add_object(entrypoint);

        for object in self.objects.values() {
            object.add_type_def(self.engine.as_ref(), &mut schema);
        }
        schema
    }

    /// Routes a call by its shape.
    ///
    /// An empty `parent_name` returns the schema, the module name constructs
    /// the object called `name`, any other parent runs `name` on that
    /// object.
    ///
    /// # Errors
    ///
    /// Returns a not found error for unknown objects or functions, otherwise
    /// the error raised by the object.
    pub fn invoke(
        &self,
        parent_name: &str,
        parent: &State,
        name: &str,
        input: &InputArgs,
    ) -> Result<Value> {
        let engine = self.engine.as_ref();

        if parent_name.is_empty() {
            return Ok(serde_json::to_value(self.schema())?);
        }

        if parent_name == self.name {
            let object = self.object(name)?;
            let state = object.new_state(engine, input)?;
            return Ok(serde_json::from_slice(state.as_bytes())?);
        }

        self.object(parent_name)?.invoke(engine, parent, name, input)
    }

    fn object(&self, name: &str) -> Result<&dyn Object> {
        self.objects
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| DockmodError::not_found("object", name))
    }

    /// Runs a wire call and wraps the outcome.
    pub fn dispatch(&self, call: &FunctionCall) -> CallResponse {
        tracing::info!(parent = %call.parent_name, function = %call.name, "dispatching call");
        let parent = State::new(call.parent.as_bytes());
        match self.invoke(&call.parent_name, &parent, &call.name, &call.input()) {
            Ok(value) => CallResponse::Ok { value },
            Err(e) => {
                tracing::warn!(error = %e, kind = %e.kind(), "call failed");
                e.into()
            }
        }
    }
}
