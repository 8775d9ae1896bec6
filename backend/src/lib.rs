//! Docker compute backend library
//!
//! Runs function runtimes as containers on a local or remote Docker host and
//! proxies invocations to the server each container hosts.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod runtime;

pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use runtime::RuntimeManager;
