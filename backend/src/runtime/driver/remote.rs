//! Driver running the docker CLI against a remote daemon

use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use super::{retain_prefixed, ContainerDriver, LaunchSpec};
use crate::error::{Result, RuntimeError};

/// Runs `docker` subprocesses, optionally pointed at another daemon
pub struct RemoteShellDriver {
    /// Path to docker binary
    docker_path: String,

    /// Value for `docker --host`
    docker_host: Option<String>,
}

impl RemoteShellDriver {
    pub fn new(docker_path: impl Into<String>, docker_host: Option<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
            docker_host,
        }
    }

    fn global_args(&self) -> Vec<String> {
        match &self.docker_host {
            Some(host) => vec!["--host".to_string(), host.clone()],
            None => vec![],
        }
    }

    async fn ps(&self, args: Vec<String>, prefix: &str) -> Result<Vec<String>> {
        let output = self.docker(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::Connection(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(retain_prefixed(parse_ps_names(&stdout), prefix))
    }

    async fn docker(&self, args: Vec<String>) -> Result<Output> {
        let mut full_args = self.global_args();
        full_args.extend(args);

        debug!(args = ?full_args, "Running docker");

        let output = Command::new(&self.docker_path)
            .args(&full_args)
            .output()
            .await?;

        Ok(output)
    }
}

/// Arguments for `docker ps`: every state with `all`, running containers otherwise
fn ps_args(prefix: &str, all: bool) -> Vec<String> {
    let mut args = vec!["ps".to_string()];
    if all {
        args.push("-a".to_string());
    }
    args.push("-f".to_string());
    args.push(format!("name={}", prefix));
    if !all {
        args.push("-f".to_string());
        args.push("status=running".to_string());
    }
    args
}

/// Arguments for `docker run` starting a runtime container
fn run_args(spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--user".to_string(),
        spec.user.clone(),
        "--volume".to_string(),
        spec.bind(),
        "--publish".to_string(),
        format!("{}:{}", spec.host_port, spec.container_port),
        "--entrypoint".to_string(),
        spec.entrypoint.clone(),
        spec.image.clone(),
    ];
    args.extend(spec.command.iter().cloned());
    args
}

/// Container names from `docker ps` table output: header skipped, last column
fn parse_ps_names(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ContainerDriver for RemoteShellDriver {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let args = ps_args(prefix, true);
        self.ps(args, prefix).await
    }

    async fn running(&self, prefix: &str) -> Result<Vec<String>> {
        let args = ps_args(prefix, false);
        self.ps(args, prefix).await
    }

    async fn start(&self, spec: &LaunchSpec) -> Result<()> {
        let output = self.docker(run_args(spec)).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(name = %spec.name, stderr = %stderr, "Container start failed");
            return Err(RuntimeError::RuntimeStart(stderr.trim().to_string()));
        }

        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let output = self
            .docker(vec!["rm".to_string(), "-f".to_string(), name.to_string()])
            .await?;

        if !output.status.success() {
            debug!(
                name = %name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "docker rm failed, container probably absent"
            );
        }

        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<()> {
        let output = self
            .docker(vec!["pull".to_string(), image.to_string()])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(image = %image, stderr = %stderr, "Image pull failed");
            return Err(RuntimeError::Pull(stderr.trim().to_string()));
        }

        Ok(())
    }
}
