//! Container engine drivers
//!
//! A runtime manager talks to the container engine only through
//! [`ContainerDriver`]. The implementation is picked once from the host
//! mode:
//! - [`LocalEngineDriver`]: Docker engine API through bollard
//! - [`RemoteShellDriver`]: docker CLI subprocesses

mod local;
mod remote;

use async_trait::async_trait;

use crate::error::Result;

pub use local::LocalEngineDriver;
pub use remote::RemoteShellDriver;

/// Everything needed to start one runtime container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Container name
    pub name: String,
    /// Image to run
    pub image: String,
    /// Entrypoint override (the interpreter)
    pub entrypoint: String,
    /// Arguments passed to the entrypoint
    pub command: Vec<String>,
    /// Host directory bind-mounted into the container
    pub host_dir: String,
    /// Mount point inside the container
    pub container_dir: String,
    /// Numeric user the container runs as
    pub user: String,
    /// Published host port
    pub host_port: u16,
    /// Port the server listens on inside the container
    pub container_port: u16,
}

impl LaunchSpec {
    /// Bind mount in `host:container` form
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host_dir, self.container_dir)
    }

    /// Exposed port key in engine API form
    pub fn port_key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }
}

/// Container engine operations used by the runtime manager
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Names of containers whose name starts with `prefix`, in any state
    /// the engine reports for enumeration
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Names of running containers whose name starts with `prefix`
    async fn running(&self, prefix: &str) -> Result<Vec<String>>;

    /// Start a detached, self-removing container
    async fn start(&self, spec: &LaunchSpec) -> Result<()>;

    /// Force-stop a container. A missing container is not an error
    async fn stop(&self, name: &str) -> Result<()>;

    /// Pull an image
    async fn pull(&self, image: &str) -> Result<()>;
}

/// Keep only names that carry the prefix at the start
pub(crate) fn retain_prefixed(names: impl IntoIterator<Item = String>, prefix: &str) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim_start_matches('/').to_string())
        .filter(|n| n.starts_with(prefix))
        .collect()
}
