//! End-to-end tests of codebase discovery.
//!
//! These tests lay out real files on disk and verify:
//! 1. Descriptor discovery (file name patterns, missing descriptors)
//! 2. Compose normalization (sources, ports, volumes, environment)
//! 3. Dependency resolution (start order, closure, cycles, unknown names)

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::path::Path;

use dockmod_common::error::{DockmodError, ErrorKind};
use dockmod_common::types::Protocol;
use dockmod_descriptor::codebase::Codebase;
use dockmod_descriptor::compose::source::Source;

fn write(root: &Path, name: &str, content: &str) {
    std::fs::write(root.join(name), content).expect("fixture should be writable");
}

// ── Discovery ────────────────────────────────────────────────────────

#[test]
fn discovers_suffixed_dockerfile() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "api.Dockerfile", "FROM golang:1.22 AS build\nFROM scratch\n");

    let codebase = Codebase::discover(dir.path()).unwrap();
    let dockerfile = codebase.dockerfile().expect("dockerfile should be found");
    assert_eq!(dockerfile.filename(), "api.Dockerfile");
    assert_eq!(dockerfile.stages(), ["build"]);
    assert!(codebase.compose().is_none());
}

#[test]
fn empty_codebase_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Codebase::discover(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn malformed_manifest_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "compose.yaml", "services: [unclosed\n");
    let err = Codebase::discover(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

// ── Compose normalization ────────────────────────────────────────────

#[test]
fn compose_services_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("migrations")).unwrap();
    write(dir.path(), "nginx.conf", "events {}\n");
    write(
        dir.path(),
        "docker-compose.yml",
        r"
name: shop
services:
  api:
    build:
      context: ./api
      args:
        RELEASE: '1'
        UNSET:
    ports:
      - '3000:3000'
      - '5353:53/udp'
    environment:
      - LOG_LEVEL=debug
      - STRIPE_KEY
    depends_on:
      db:
        condition: service_healthy
  db:
    image: postgres:16
    volumes:
      - ./migrations:/docker-entrypoint-initdb.d
      - ./nginx.conf:/etc/nginx.conf
      - ./missing:/data
",
    );

    let codebase = Codebase::discover(dir.path()).unwrap();
    let project = codebase.compose().unwrap();
    assert_eq!(project.name(), "shop");
    assert_eq!(project.start_order(), ["db", "api"]);

    let api = project.get_service("api").unwrap();
    let Source::Dockerfile { context, build_args, .. } = api.source() else {
        panic!("api should be built");
    };
    assert_eq!(context, "./api");
    assert_eq!(build_args.get("RELEASE"), Some(&Some("1".to_string())));
    assert_eq!(build_args.get("UNSET"), Some(&None));

    let published = api.published_ports();
    assert_eq!(published.len(), 2);
    assert!(published.iter().any(|p| p.target == 53 && p.protocol == Protocol::Udp));

    let (plain, secrets) = api.environment();
    assert_eq!(plain.get("LOG_LEVEL").map(String::as_str), Some("debug"));
    assert_eq!(secrets, ["STRIPE_KEY"]);
    assert_eq!(api.depends_on(), ["db"]);

    let db = project.get_service("db").unwrap();
    assert!(!db.is_exposed());
    let (volumes, caches) = db.volumes();
    assert_eq!(volumes.len(), 2);
    assert!(volumes.iter().any(|v| v.name() == "migrations" && v.is_dir()));
    assert!(volumes.iter().any(|v| v.name() == "nginx.conf" && !v.is_dir()));
    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].name(), "missing");
}

// ── Dependencies ─────────────────────────────────────────────────────

#[test]
fn dependency_closure_is_transitive() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "compose.yml",
        "services:\n  web:\n    image: web\n    depends_on: [api]\n  api:\n    image: api\n    depends_on: [db]\n  db:\n    image: db\n",
    );
    let codebase = Codebase::discover(dir.path()).unwrap();
    let project = codebase.compose().unwrap();
    assert_eq!(project.start_order(), ["db", "api", "web"]);

    let web = project.get_service("web").unwrap();
    assert_eq!(web.direct_dependencies(), ["api"]);
    let mut closure = web.depends_on().to_vec();
    closure.sort();
    assert_eq!(closure, ["api", "db"]);
}

#[test]
fn unknown_dependency_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "compose.yml",
        "services:\n  web:\n    image: web\n    depends_on: [cache]\n",
    );
    let err = Codebase::discover(dir.path()).unwrap_err();
    assert!(matches!(err, DockmodError::NotFound { kind: "service", .. }));
    assert!(err.to_string().contains("cache"));
}

#[test]
fn self_dependency_is_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "compose.yml",
        "services:\n  loop:\n    image: loop\n    depends_on: [loop]\n",
    );
    let err = Codebase::discover(dir.path()).unwrap_err();
    assert!(matches!(err, DockmodError::DependencyCycle { .. }));
}
