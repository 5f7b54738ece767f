//! Container engine collaborator for Dockmod.
//!
//! Dockmod never builds or runs containers itself. It assembles immutable
//! [`container::Container`] handles and delegates the few operations that
//! need a real engine to a [`engine::ContainerEngine`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod docker;
pub mod engine;
pub mod memory;
