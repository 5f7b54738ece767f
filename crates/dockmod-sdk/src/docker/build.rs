//! `Docker.Build`: build the codebase Dockerfile.

use dockmod_common::error::Result;
use dockmod_common::types::Platform;
use dockmod_descriptor::dockerfile::Dockerfile;
use dockmod_engine::container::BuildOptions;
use dockmod_engine::engine::ContainerEngine;
use serde_json::Value;

use super::DockerState;
use crate::object::{Function, InputArgs, container_result, load_secret};
use crate::schema::{EnumDef, FunctionArg, FunctionDef, ModuleSchema, TypeDef};

/// Builds the Dockerfile with caller-supplied args, secrets, platform and
/// target stage.
pub struct BuildFunction {
    stage_enum: String,
    dockerfile: Dockerfile,
}

impl BuildFunction {
    /// Creates the function for the object named `object`.
    #[must_use]
    pub fn new(object: &str, dockerfile: Dockerfile) -> Self {
        Self {
            stage_enum: format!("{object}Stage"),
            dockerfile,
        }
    }
}

impl Function<DockerState> for BuildFunction {
    fn type_def(&self, engine: &dyn ContainerEngine, schema: &mut ModuleSchema) -> FunctionDef {
        let mut def = FunctionDef::new("Build", TypeDef::object("Container"))
            .with_description("Build a container from the Dockerfile in the current directory")
            .with_arg(
                FunctionArg::new("dockerfile", TypeDef::String)
                    .with_default(self.dockerfile.filename())
                    .with_description("Path to the Dockerfile to use."),
            );

        for (key, value) in self.dockerfile.args() {
            let mut arg = FunctionArg::new(key.as_str(), TypeDef::String)
                .with_description(format!("Set {key} build argument"));
            if !value.is_empty() {
                arg = arg.with_default(value.as_str());
            }
            def = def.with_arg(arg);
        }

        for secret in self.dockerfile.secrets() {
            def = def.with_arg(
                FunctionArg::new(secret.as_str(), TypeDef::object("Secret"))
                    .with_description(format!("Set {secret} secret")),
            );
        }

        let mut platform = FunctionArg::new(
            "platform",
            TypeDef::Scalar {
                name: "Platform".to_string(),
            },
        )
        .optional()
        .with_description("Platform to build.");
        match engine.default_platform() {
            Ok(default) => platform = platform.with_default(default.as_str()),
            Err(e) => tracing::warn!(error = %e, "default platform unavailable; omitting default"),
        }
        def = def.with_arg(platform);

        if !self.dockerfile.stages().is_empty() {
            schema.add_enum(EnumDef {
                name: self.stage_enum.clone(),
                values: self.dockerfile.stages().to_vec(),
            });
            def = def.with_arg(
                FunctionArg::new(
                    "target",
                    TypeDef::Enum {
                        name: self.stage_enum.clone(),
                    },
                )
                .optional()
                .with_description("Target stage to build."),
            );
        }

        def
    }

    fn invoke(
        &self,
        engine: &dyn ContainerEngine,
        state: &DockerState,
        input: &InputArgs,
    ) -> Result<Value> {
        let dir = state.directory(engine)?;

        let mut options = BuildOptions {
            dockerfile: input.load::<String>("dockerfile")?,
            platform: input.load::<Platform>("platform")?,
            target: input.load::<String>("target")?,
            ..BuildOptions::default()
        };

        for key in self.dockerfile.args().keys() {
            if let Some(value) = input.load::<String>(key)? {
                let _ = options.build_args.insert(key.clone(), value);
            }
        }

        for secret in self.dockerfile.secrets() {
            if let Some(id) = load_secret(engine, input, secret, secret)? {
                options.secrets.push(id);
            }
        }

        tracing::info!(
            dockerfile = %self.dockerfile.filename(),
            build_args = options.build_args.len(),
            secrets = options.secrets.len(),
            "building Dockerfile"
        );
        let container = engine.build_image(&dir, &options)?;
        container_result(&container)
    }
}
