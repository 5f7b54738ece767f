//! End-to-end dispatch tests against the in-memory engine.
//!
//! Each test lays out a codebase in a temporary directory, discovers its
//! descriptors, and drives the module through wire calls:
//! 1. Schema generation (objects, arguments, enums)
//! 2. Construction and method calls through serialized state
//! 3. Compose service resolution and the aggregating proxy
//! 4. Error kinds surfaced to the caller

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use dockmod_common::config::DockmodConfig;
use dockmod_common::error::ErrorKind;
use dockmod_common::types::Protocol;
use dockmod_descriptor::codebase::Codebase;
use dockmod_engine::container::{Container, ContainerSource, Mount};
use dockmod_engine::memory::{EngineCall, ImageConfig, MemoryEngine};
use dockmod_sdk::module::Module;
use dockmod_sdk::protocol::{CallArgument, CallResponse, FunctionCall};
use dockmod_sdk::schema::{ModuleSchema, TypeDef};
use serde_json::Value;
use tempfile::TempDir;

const DOCKERFILE: &str = r"ARG VERSION=1.0
ARG REGISTRY
FROM node:20 AS deps
RUN --mount=type=secret,id=npm_token npm ci
FROM deps AS runtime
CMD [npm, start]
";

const COMPOSE: &str = r"
services:
  web:
    image: nginx:alpine
    ports:
      - '8080:80'
    environment:
      APP_MODE: production
      BASE_URL: http://$APP_MODE.local
    volumes:
      - ./site:/usr/share/nginx/html
      - logs:/var/log/nginx
    depends_on:
      - db
  db:
    image: postgres:16
    environment:
      POSTGRES_DB: app
";

struct Fixture {
    _dir: TempDir,
    engine: Arc<MemoryEngine>,
    module: Module,
}

fn fixture(files: &[(&str, &str)], dirs: &[&str], engine: MemoryEngine) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    for sub in dirs {
        std::fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    let codebase = Codebase::discover(dir.path()).unwrap();
    let engine = Arc::new(engine);
    let module = Module::new(&DockmodConfig::default(), &codebase, engine.clone());
    Fixture {
        _dir: dir,
        engine,
        module,
    }
}

fn postgres() -> ImageConfig {
    ImageConfig {
        user: "postgres".into(),
        exposed_ports: vec![5432],
    }
}

fn compose_fixture() -> Fixture {
    let engine = MemoryEngine::new()
        .with_image("postgres:16", postgres())
        .with_image("postgres:17", postgres());
    fixture(&[("docker-compose.yml", COMPOSE)], &["site"], engine)
}

fn call(module: &Module, parent_name: &str, parent: &Value, name: &str, args: &[(&str, &str)]) -> CallResponse {
    module.dispatch(&FunctionCall {
        parent_name: parent_name.into(),
        name: name.into(),
        parent: parent.to_string(),
        input_args: args
            .iter()
            .map(|(name, value)| CallArgument {
                name: (*name).into(),
                value: (*value).into(),
            })
            .collect(),
    })
}

fn ok(response: CallResponse) -> Value {
    match response {
        CallResponse::Ok { value } => value,
        CallResponse::Error { kind, message } => panic!("call failed ({kind}): {message}"),
    }
}

fn err(response: CallResponse) -> (ErrorKind, String) {
    match response {
        CallResponse::Error { kind, message } => (kind, message),
        CallResponse::Ok { value } => panic!("call unexpectedly succeeded: {value}"),
    }
}

fn schema(module: &Module) -> ModuleSchema {
    serde_json::from_value(ok(call(module, "", &Value::Null, "", &[]))).unwrap()
}

fn container(value: &Value) -> Container {
    serde_json::from_value(value["container"].clone()).unwrap()
}

/// Constructs `Docker` and, through it, `Compose`; returns the Compose state.
fn compose_state(module: &Module) -> Value {
    let docker = ok(call(module, "Dockmod", &Value::Null, "Docker", &[]));
    ok(call(module, "Docker", &docker, "Compose", &[]))
}

fn from_image_count(engine: &MemoryEngine, reference: &str) -> usize {
    engine
        .calls()
        .iter()
        .filter(|call| matches!(call, EngineCall::FromImage { reference: r } if r == reference))
        .count()
}

// ── Schema ───────────────────────────────────────────────────────────

#[test]
fn schema_call_is_idempotent() {
    let fx = compose_fixture();
    assert_eq!(schema(&fx.module), schema(&fx.module));
    assert!(fx.engine.calls().is_empty());
}

#[test]
fn build_schema_reflects_dockerfile() {
    let fx = fixture(&[("Dockerfile", DOCKERFILE)], &[], MemoryEngine::new());
    let schema = schema(&fx.module);

    let build = schema.object("Docker").unwrap().function("Build").unwrap();
    assert_eq!(build.return_type, TypeDef::object("Container"));

    let version = build.arg("VERSION").unwrap();
    assert!(version.optional);
    assert_eq!(version.default_value, Some(Value::from("1.0")));

    let registry = build.arg("REGISTRY").unwrap();
    assert!(!registry.optional);
    assert!(registry.default_value.is_none());

    assert_eq!(build.arg("npm_token").unwrap().type_def, TypeDef::object("Secret"));
    assert_eq!(
        build.arg("target").unwrap().type_def,
        TypeDef::Enum {
            name: "DockerStage".into()
        }
    );
    assert_eq!(schema.enum_def("DockerStage").unwrap().values, ["deps", "runtime"]);
    assert!(build.arg("platform").unwrap().default_value.is_some());
}

#[test]
fn platform_default_is_omitted_when_engine_cannot_report_it() {
    let fx = fixture(
        &[("Dockerfile", "FROM alpine\n")],
        &[],
        MemoryEngine::new().with_platform(None),
    );
    let schema = schema(&fx.module);
    let build = schema.object("Docker").unwrap().function("Build").unwrap();
    let platform = build.arg("platform").unwrap();
    assert!(platform.optional);
    assert!(platform.default_value.is_none());
    assert!(build.arg("target").is_none());
    assert!(schema.enums.is_empty());
}

#[test]
fn service_schema_transforms_env_names_and_prefixes_dependencies() {
    let fx = compose_fixture();
    let schema = schema(&fx.module);
    let compose = schema.object("Compose").unwrap();

    let web = compose.function("web").unwrap();
    assert_eq!(web.description, "Create a web service container");
    assert_eq!(web.arg("AppMode").unwrap().default_value, Some(Value::from("production")));
    assert_eq!(web.arg("image").unwrap().default_value, Some(Value::from("nginx:alpine")));
    assert_eq!(web.arg("site").unwrap().default_path.as_deref(), Some("./site"));
    assert_eq!(web.arg("db_image").unwrap().default_value, Some(Value::from("postgres:16")));
    assert!(web.arg("db_PostgresDb").is_some());
    assert!(compose.function("db").unwrap().arg("web_image").is_none());

    let all = compose.function("All").unwrap();
    assert_eq!(all.description, "Start all service containers (db, web)");
    assert!(all.arg("web_AppMode").is_some());
    assert!(all.arg("db_image").is_some());
    assert!(all.arg("image").is_none());
}

// ── Construction & state ─────────────────────────────────────────────

#[test]
fn construction_state_round_trips_into_method_calls() {
    let fx = fixture(&[("Dockerfile", DOCKERFILE)], &[], MemoryEngine::new());
    let docker = ok(call(&fx.module, "Dockmod", &Value::Null, "Docker", &[("dir", "\"host:/src\"")]));
    assert_eq!(docker["dir"], "host:/src");

    let _ = ok(call(&fx.module, "Docker", &docker, "Build", &[("REGISTRY", "\"ghcr.io\"")]));
    let built = fx.engine.calls().into_iter().find_map(|call| match call {
        EngineCall::BuildImage { context, options } => Some((context, options)),
        _ => None,
    });
    let (context, options) = built.unwrap();
    assert_eq!(context.as_str(), "host:/src");
    assert_eq!(options.build_args.get("REGISTRY").map(String::as_str), Some("ghcr.io"));
    assert!(!options.build_args.contains_key("VERSION"));
}

#[test]
fn unknown_object_on_construction_is_not_found() {
    let fx = compose_fixture();
    let (kind, message) = err(call(&fx.module, "Dockmod", &Value::Null, "Helm", &[]));
    assert_eq!(kind, ErrorKind::NotFound);
    assert!(message.contains("Helm"));
}

#[test]
fn unknown_function_is_not_found() {
    let fx = compose_fixture();
    let state = compose_state(&fx.module);
    let (kind, message) = err(call(&fx.module, "Compose", &state, "cache", &[]));
    assert_eq!(kind, ErrorKind::NotFound);
    assert!(message.contains("Compose.cache"));
}

#[test]
fn undecodable_argument_names_the_argument() {
    let fx = fixture(&[("Dockerfile", DOCKERFILE)], &[], MemoryEngine::new());
    let docker = ok(call(&fx.module, "Dockmod", &Value::Null, "Docker", &[]));
    let (kind, message) = err(call(&fx.module, "Docker", &docker, "Build", &[("VERSION", "{not json")]));
    assert_eq!(kind, ErrorKind::ArgumentDecoding);
    assert!(message.contains("VERSION"));
}

// ── Build ────────────────────────────────────────────────────────────

#[test]
fn build_failure_surfaces_engine_message_verbatim() {
    let engine = MemoryEngine::new().with_build_failure("process \"npm ci\" did not complete successfully: exit code: 1");
    let fx = fixture(&[("Dockerfile", DOCKERFILE)], &[], engine);
    let docker = ok(call(&fx.module, "Dockmod", &Value::Null, "Docker", &[]));
    let (kind, message) = err(call(&fx.module, "Docker", &docker, "Build", &[]));
    assert_eq!(kind, ErrorKind::Execution);
    assert_eq!(message, "process \"npm ci\" did not complete successfully: exit code: 1");
}

#[test]
fn build_secret_is_registered_under_its_dockerfile_id() {
    let engine = MemoryEngine::new().with_secret("env://NPM_TOKEN", "s3cr3t");
    let fx = fixture(&[("Dockerfile", DOCKERFILE)], &[], engine);
    let docker = ok(call(&fx.module, "Dockmod", &Value::Null, "Docker", &[]));
    let result = ok(call(
        &fx.module,
        "Docker",
        &docker,
        "Build",
        &[("npm_token", "\"env://NPM_TOKEN\""), ("target", "\"deps\"")],
    ));

    let calls = fx.engine.calls();
    assert!(calls.contains(&EngineCall::SetSecret {
        name: "npm_token".into()
    }));
    let ContainerSource::Build { options, .. } = container(&result).source().clone() else {
        panic!("expected a built container");
    };
    assert_eq!(options.secrets.len(), 1);
    assert!(options.secrets[0].as_str().starts_with("mem://npm_token/"));
    assert_eq!(options.target.as_deref(), Some("deps"));
}

// ── Compose ──────────────────────────────────────────────────────────

#[test]
fn service_function_starts_dependencies_and_binds_them() {
    let fx = compose_fixture();
    let state = compose_state(&fx.module);
    let web = container(&ok(call(
        &fx.module,
        "Compose",
        &state,
        "web",
        &[("AppMode", "\"staging\""), ("db_image", "\"postgres:17\"")],
    )));

    assert_eq!(web.env_variable("APP_MODE"), Some("staging"));
    assert_eq!(web.env_variable("BASE_URL"), Some("http://staging.local"));
    assert_eq!(web.service_bindings()[0].alias, "db");
    assert_eq!(from_image_count(&fx.engine, "postgres:17"), 1);
    assert_eq!(from_image_count(&fx.engine, "postgres:16"), 0);

    let site = web
        .mounts()
        .iter()
        .find(|m| m.target() == "/usr/share/nginx/html")
        .unwrap();
    assert!(matches!(site, Mount::Directory { source, owner: None, .. } if source.as_str() == "host:/site"));
    assert!(web
        .mounts()
        .iter()
        .any(|m| matches!(m, Mount::Cache { volume, .. } if volume == "logs")));
}

#[test]
fn all_starts_dependencies_first_and_proxies_published_ports() {
    let fx = compose_fixture();
    let state = compose_state(&fx.module);
    let proxy = container(&ok(call(&fx.module, "Compose", &state, "All", &[("db_PostgresDb", "\"prod\"")])));

    let pulls: Vec<String> = fx
        .engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::FromImage { reference } => Some(reference),
            _ => None,
        })
        .collect();
    assert_eq!(pulls, ["postgres:16", "nginx:alpine", "nginx:1.25.3"]);

    let aliases: Vec<&str> = proxy.service_bindings().iter().map(|b| b.alias.as_str()).collect();
    assert_eq!(aliases, ["web"]);
    assert_eq!(proxy.exposed_ports().len(), 1);
    assert_eq!(proxy.exposed_ports()[0].port, 8080);
    assert_eq!(proxy.exposed_ports()[0].protocol, Protocol::Tcp);

    let route = proxy.file("/etc/nginx/conf.d/web_8080.conf").unwrap();
    assert!(route.contains("proxy_pass http://web:80;"));
    assert!(proxy.file("/etc/nginx/conf.d/db_5432.conf").is_none());
    assert_eq!(proxy.default_args().unwrap(), ["nginx", "-g", "daemon off;"]);
}

#[test]
fn all_leaves_a_portless_dependency_unbound() {
    let compose = "services:\n  web:\n    image: web\n    ports: ['8080:8080']\n    depends_on: [db]\n  db:\n    image: postgres\n";
    let fx = fixture(&[("compose.yml", compose)], &[], MemoryEngine::new());
    let state = compose_state(&fx.module);
    let proxy = container(&ok(call(&fx.module, "Compose", &state, "All", &[])));

    assert_eq!(from_image_count(&fx.engine, "postgres"), 1);
    let aliases: Vec<&str> = proxy.service_bindings().iter().map(|b| b.alias.as_str()).collect();
    assert_eq!(aliases, ["web"]);
    assert_eq!(proxy.exposed_ports().len(), 1);
    assert_eq!(proxy.exposed_ports()[0].port, 8080);
    assert!(
        proxy
            .file("/etc/nginx/conf.d/web_8080.conf")
            .unwrap()
            .contains("proxy_pass http://web:8080;")
    );
}

#[test]
fn all_routes_expose_only_ports_as_themselves() {
    let compose = "services:\n  web:\n    image: web\n    expose: ['8080']\n    depends_on: [db]\n  db:\n    image: db\n    expose: ['5432']\n";
    let fx = fixture(&[("compose.yml", compose)], &[], MemoryEngine::new());
    let state = compose_state(&fx.module);
    let proxy = container(&ok(call(&fx.module, "Compose", &state, "All", &[])));

    let mut ports: Vec<u16> = proxy.exposed_ports().iter().map(|p| p.port).collect();
    ports.sort_unstable();
    assert_eq!(ports, [5432, 8080]);
    assert!(
        proxy
            .file("/etc/nginx/conf.d/web_8080.conf")
            .unwrap()
            .contains("proxy_pass http://web:8080;")
    );
}

#[test]
fn all_starts_a_shared_dependency_once() {
    let compose = "services:\n  a:\n    image: a\n    depends_on: [db]\n  b:\n    image: b\n    depends_on: [db]\n  db:\n    image: postgres:16\n";
    let engine = MemoryEngine::new().with_image("postgres:16", postgres());
    let fx = fixture(&[("compose.yml", compose)], &[], engine);
    let state = compose_state(&fx.module);
    let _ = ok(call(&fx.module, "Compose", &state, "All", &[]));

    assert_eq!(from_image_count(&fx.engine, "postgres:16"), 1);
    assert_eq!(from_image_count(&fx.engine, "a"), 1);
    assert_eq!(from_image_count(&fx.engine, "b"), 1);
}

#[test]
fn binding_a_dependency_without_ports_is_a_configuration_error() {
    let fx = fixture(
        &[(
            "compose.yaml",
            "services:\n  app:\n    image: app\n    depends_on: [worker]\n  worker:\n    image: worker\n",
        )],
        &[],
        MemoryEngine::new(),
    );
    let state = compose_state(&fx.module);
    let (kind, message) = err(call(&fx.module, "Compose", &state, "app", &[]));
    assert_eq!(kind, ErrorKind::Configuration);
    assert!(message.contains("worker"));
}

#[test]
fn secret_environment_variable_requires_an_argument() {
    let compose = "services:\n  api:\n    image: api\n    environment:\n      - API_TOKEN\n";
    let engine = MemoryEngine::new().with_secret("env://TOKEN", "t0k3n");
    let fx = fixture(&[("compose.yml", compose)], &[], engine);
    let state = compose_state(&fx.module);

    let (kind, _) = err(call(&fx.module, "Compose", &state, "api", &[]));
    assert_eq!(kind, ErrorKind::Configuration);

    let api = container(&ok(call(&fx.module, "Compose", &state, "api", &[("ApiToken", "\"env://TOKEN\"")])));
    assert_eq!(api.secret_variables()[0].name, "API_TOKEN");
}

#[test]
fn dependency_cycle_fails_discovery() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("compose.yml"),
        "services:\n  a:\n    image: a\n    depends_on: [b]\n  b:\n    image: b\n    depends_on: [a]\n",
    )
    .unwrap();
    let err = Codebase::discover(dir.path()).unwrap_err();
    assert!(err.to_string().contains("a, b"), "got: {err}");
}
