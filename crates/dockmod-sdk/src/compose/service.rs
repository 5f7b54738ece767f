//! Per-service functions of the `Compose` object.

use std::collections::BTreeMap;
use std::sync::Arc;

use dockmod_common::constants::SECRETS_MOUNT_DIR;
use dockmod_common::error::{DockmodError, Result};
use dockmod_common::types::{DirectoryId, SecretId};
use dockmod_descriptor::compose::ComposeProject;
use dockmod_descriptor::compose::service::Service;
use dockmod_descriptor::compose::source::Source;
use dockmod_engine::container::BuildOptions;
use dockmod_engine::engine::ContainerEngine;
use serde_json::Value;

use super::ComposeState;
use super::session::{ArgumentScope, ResolutionSession, RunningService};
use crate::naming::{format_env_variable_name, prefixed_arg_name};
use crate::object::{Function, InputArgs, container_result, load_file, load_secret};
use crate::schema::{FunctionArg, FunctionDef, ModuleSchema, TypeDef};

/// Returns the arguments a service reads, unprefixed.
pub fn service_arguments(service: &Service) -> Vec<FunctionArg> {
    let mut args = Vec::new();

    if let Source::Image { reference } = service.source() {
        args.push(
            FunctionArg::new("image", TypeDef::String)
                .with_default(reference.as_str())
                .with_description("Image to use for the service"),
        );
    }

    let (plain, secrets) = service.environment();
    for (key, value) in &plain {
        args.push(
            FunctionArg::new(format_env_variable_name(key), TypeDef::String)
                .with_default(value.as_str())
                .with_description(format!("Set environment variable {key}")),
        );
    }
    for key in &secrets {
        args.push(
            FunctionArg::new(format_env_variable_name(key), TypeDef::object("Secret"))
                .with_description(format!("Set secret environment variable {key}")),
        );
    }

    for secret in service.mounted_secrets() {
        args.push(
            FunctionArg::new(secret.as_str(), TypeDef::object("Secret"))
                .with_description(format!("Secret {secret} to mount")),
        );
    }

    let (volumes, _) = service.volumes();
    for volume in volumes {
        let type_def = if volume.is_dir() {
            TypeDef::object("Directory")
        } else {
            TypeDef::object("File")
        };
        args.push(
            FunctionArg::new(volume.name(), type_def)
                .with_default_path(volume.origin())
                .with_description(format!("Mount directory at {}", volume.target())),
        );
    }

    args
}

/// Assembles one service container; dependencies must already be running.
///
/// Under the `Direct` scope a dependency exposing no port cannot be bound
/// and fails the call; under `Aggregate` it is left unbound.
pub(crate) fn materialize_service(
    engine: &dyn ContainerEngine,
    dir: &DirectoryId,
    service: &Service,
    scope: ArgumentScope<'_>,
    args: &InputArgs,
    running: &BTreeMap<String, RunningService>,
) -> Result<RunningService> {
    let name = service.name();
    let mut ctr = match service.source() {
        Source::Image { reference } => {
            let image = args
                .load::<String>("image")?
                .filter(|image| !image.is_empty())
                .unwrap_or_else(|| reference.clone());
            engine.from_image(&image)?
        }
        Source::Dockerfile {
            context,
            dockerfile,
            build_args,
            target,
        } => {
            let context = engine.subdirectory(dir, context)?;
            let options = BuildOptions {
                dockerfile: Some(dockerfile.clone()),
                build_args: build_args
                    .iter()
                    .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
                    .collect(),
                target: target.clone(),
                ..BuildOptions::default()
            };
            engine.build_image(&context, &options)?
        }
    };

    let user = engine.user(&ctr)?;
    let owner = (!user.is_empty()).then(|| format!("{user}:{user}"));
    let service = service.with_discovered_ports(&engine.exposed_ports(&ctr)?);

    if let Some(workdir) = service.workdir() {
        ctr = ctr.with_workdir(workdir);
    }

    let (plain, secrets) = service.environment();
    for (key, default) in plain {
        let value = args
            .load::<String>(&format_env_variable_name(&key))?
            .unwrap_or(default);
        ctr = ctr.with_env_variable(key, value, true);
    }
    for key in secrets {
        let secret = required_secret(engine, args, name, &format_env_variable_name(&key), &key)?;
        ctr = ctr.with_secret_variable(key, secret);
    }

    for secret in service.mounted_secrets() {
        let id = required_secret(engine, args, name, secret, secret)?;
        ctr = ctr.with_mounted_secret(format!("{SECRETS_MOUNT_DIR}/{secret}"), id);
    }

    for port in service.port_specs() {
        ctr = ctr.with_exposed_port(port.target, port.protocol);
    }

    let (volumes, caches) = service.volumes();
    for volume in volumes {
        ctr = if volume.is_dir() {
            let source = match args.load::<DirectoryId>(volume.name())? {
                Some(source) => source,
                None => engine.subdirectory(dir, volume.origin())?,
            };
            ctr.with_mounted_directory(volume.target(), source, owner.clone())
        } else {
            let source = load_file(engine, args, volume.name(), volume.origin())?;
            ctr.with_mounted_file(volume.target(), source, owner.clone())
        };
    }
    for cache in caches {
        ctr = ctr.with_mounted_cache(cache.path(), cache.name(), owner.clone());
    }

    if let Some(entrypoint) = service.entrypoint() {
        ctr = ctr.with_entrypoint(entrypoint.to_vec());
    }
    if let Some(command) = service.command() {
        ctr = ctr.with_default_args(command.to_vec());
    }

    for dependency in service.direct_dependencies() {
        let bound = running
            .get(dependency)
            .ok_or_else(|| DockmodError::not_found("service", dependency.as_str()))?;
        if bound.service.ports().is_empty() {
            if matches!(scope, ArgumentScope::Aggregate) {
                tracing::debug!(
                    service = name,
                    dependency = %dependency,
                    "dependency exposes no port, not bound"
                );
                continue;
            }
            return Err(DockmodError::config(format!(
                "service {name} depends on {dependency}, which exposes no port"
            )));
        }
        ctr = ctr.with_service_binding(dependency.as_str(), &bound.container);
    }

    Ok(RunningService {
        container: ctr,
        service,
    })
}

fn required_secret(
    engine: &dyn ContainerEngine,
    args: &InputArgs,
    service: &str,
    arg: &str,
    name: &str,
) -> Result<SecretId> {
    load_secret(engine, args, arg, name)?.ok_or_else(|| {
        DockmodError::config(format!("service {service} requires secret argument {arg}"))
    })
}

/// Function starting one service and its dependencies.
pub struct ServiceFunction {
    project: Arc<ComposeProject>,
    name: String,
}

impl ServiceFunction {
    /// Creates the function for the service `name` of `project`.
    pub fn new(project: Arc<ComposeProject>, name: impl Into<String>) -> Self {
        Self {
            project,
            name: name.into(),
        }
    }
}

impl Function<ComposeState> for ServiceFunction {
    fn type_def(&self, _engine: &dyn ContainerEngine, _schema: &mut ModuleSchema) -> FunctionDef {
        let mut def = FunctionDef::new(&self.name, TypeDef::object("Container"))
            .with_description(format!("Create a {} service container", self.name));

        let Ok(service) = self.project.get_service(&self.name) else {
            return def;
        };
        def = def.with_args(service_arguments(service));
        for dependency in service.depends_on() {
            if let Ok(dependency_service) = self.project.get_service(dependency) {
                def = def.with_args(
                    service_arguments(dependency_service)
                        .iter()
                        .map(|arg| arg.renamed(prefixed_arg_name(dependency, &arg.name))),
                );
            }
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
        let ctr = session.materialize(
            engine,
            &self.project,
            &self.name,
            ArgumentScope::Direct { root: &self.name },
            input,
        )?;
        tracing::info!(service = %self.name, started = ?session.order(), "service ready");
        container_result(&ctr)
    }
}
