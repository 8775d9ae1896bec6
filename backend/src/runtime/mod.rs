//! Runtime management for the Docker backend
//!
//! Handles everything about function runtimes on the target host:
//! - Naming containers after the images they run
//! - Starting and stopping runtime containers through a driver
//! - Shipping the handler package to the shared directory
//! - Relaying invocations to the server inside the container

pub mod driver;
mod manager;
pub mod naming;
pub mod package;

pub use driver::{ContainerDriver, LaunchSpec, LocalEngineDriver, RemoteShellDriver};
pub use manager::{RuntimeManager, ALL_RUNTIMES};
pub use naming::{RuntimeKey, RUNTIME_NAME_PREFIX};
