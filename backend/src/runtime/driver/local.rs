//! Driver for a Docker engine on this machine

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures::TryStreamExt;
use tracing::{debug, info};

use super::{retain_prefixed, ContainerDriver, LaunchSpec};
use crate::error::{Result, RuntimeError};
use crate::runtime::naming::split_image_reference;

/// Talks to the local engine through its HTTP API
pub struct LocalEngineDriver {
    docker: Docker,
}

impl LocalEngineDriver {
    /// Connect to the engine using the local defaults (socket or DOCKER_HOST)
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connection(e.to_string()))?;

        let version = docker
            .version()
            .await
            .map_err(|e| RuntimeError::Connection(e.to_string()))?;

        info!(
            engine_version = %version.version.as_deref().unwrap_or("unknown"),
            "Docker engine connected"
        );

        Ok(Self { docker })
    }

    async fn names(&self, prefix: &str, status: Option<&str>) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![prefix.to_string()]);
        if let Some(status) = status {
            filters.insert("status".to_string(), vec![status.to_string()]);
        }

        let options = ListContainersOptions {
            all: false,
            filters,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;
        let names = containers
            .into_iter()
            .flat_map(|c| c.names.unwrap_or_default());

        Ok(retain_prefixed(names, prefix))
    }

    fn container_config(spec: &LaunchSpec) -> Config<String> {
        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(spec.port_key(), HashMap::new());

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            spec.port_key(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        Config {
            image: Some(spec.image.clone()),
            entrypoint: Some(vec![spec.entrypoint.clone()]),
            cmd: Some(spec.command.clone()),
            user: Some(spec.user.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                binds: Some(vec![spec.bind()]),
                auto_remove: Some(true),
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerDriver for LocalEngineDriver {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.names(prefix, None).await
    }

    async fn running(&self, prefix: &str) -> Result<Vec<String>> {
        self.names(prefix, Some("running")).await
    }

    async fn start(&self, spec: &LaunchSpec) -> Result<()> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        debug!(name = %spec.name, image = %spec.image, "Creating container");

        self.docker
            .create_container(Some(options), Self::container_config(spec))
            .await
            .map_err(|e| RuntimeError::RuntimeStart(e.to_string()))?;

        self.docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::RuntimeStart(e.to_string()))?;

        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let e = RuntimeError::from(e);
                if e.is_already_removed() {
                    debug!(name = %name, "Container already removed");
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn pull(&self, image: &str) -> Result<()> {
        let (repository, tag) = split_image_reference(image);
        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };

        let progress: Vec<_> = self
            .docker
            .create_image(Some(options), None, None)
            .try_collect()
            .await
            .map_err(|e| RuntimeError::Pull(e.to_string()))?;

        if let Some(status) = progress.last().and_then(|p| p.status.as_deref()) {
            debug!(image = %image, status = %status, "Image pulled");
        }

        Ok(())
    }
}
