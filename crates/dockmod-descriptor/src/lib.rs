//! # dockmod-descriptor
//!
//! Introspection of the build descriptors found in a codebase.
//!
//! Handles:
//! - **Dockerfile**: Lexing and extraction of stages, build args, and secret mounts.
//! - **Compose**: Manifest loading and normalization into services.
//! - **Graph**: `depends_on` cycle detection and start ordering.
//! - **Codebase**: Discovery of descriptor files in the mounted directory.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod codebase;
pub mod compose;
pub mod dockerfile;
pub mod finder;
pub mod graph;
