//! # dockmod-sdk
//!
//! Exposes the build descriptors of a codebase as typed objects.
//!
//! Provides the main entry points:
//! - [`Module`](module::Module): registry of objects, schema generation, and
//!   the call dispatcher.
//! - [`FunctionCall`](protocol::FunctionCall) /
//!   [`CallResponse`](protocol::CallResponse): the wire format of a call.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dockmod_common::config::DockmodConfig;
//! use dockmod_descriptor::codebase::Codebase;
//! use dockmod_engine::memory::MemoryEngine;
//! use dockmod_sdk::module::Module;
//! use dockmod_sdk::protocol::FunctionCall;
//!
//! # fn main() -> dockmod_common::error::Result<()> {
//! let config = DockmodConfig::default();
//! let codebase = Codebase::discover(&config.codebase)?;
//! let module = Module::new(&config, &codebase, Arc::new(MemoryEngine::new()));
//! let schema = module.dispatch(&FunctionCall::default());
//! # let _ = schema;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod compose;
pub mod docker;
pub mod module;
pub mod naming;
pub mod object;
pub mod protocol;
pub mod proxy;
pub mod schema;
