//! Runtime lifecycle and invocation proxy

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::models::{
    HostMode, InvocationResponse, RuntimeEntry, RuntimeMetadata, RuntimeState, PREINSTALLS_KEY,
};

use super::driver::{ContainerDriver, LaunchSpec, LocalEngineDriver, RemoteShellDriver};
use super::naming::{
    decode_runtime_name, encode_runtime_name, resolve_image, RuntimeKey, RUNTIME_NAME_PREFIX,
};
use super::package;

/// Filter value for [`RuntimeManager::list_runtimes`] matching every runtime
pub const ALL_RUNTIMES: &str = "all";

/// Manages runtime containers on one host and relays invocations to them
pub struct RuntimeManager {
    /// Backend configuration
    config: RuntimeConfig,

    /// Fixed at construction from the configured host
    host_mode: HostMode,

    /// Container engine access for this host mode
    driver: Box<dyn ContainerDriver>,

    /// Client for the invocation server
    http: reqwest::Client,
}

impl RuntimeManager {
    /// Create a manager, connecting to the local engine when the host is local
    pub async fn new(config: RuntimeConfig) -> Result<Self> {
        let driver: Box<dyn ContainerDriver> = match HostMode::from_host(&config.host) {
            HostMode::Local => Box::new(LocalEngineDriver::connect().await?),
            HostMode::Remote => Box::new(RemoteShellDriver::new(
                config.docker_binary.clone(),
                config.remote_docker_host.clone(),
            )),
        };

        Ok(Self::with_driver(config, driver))
    }

    /// Create a manager on top of an existing driver
    pub fn with_driver(config: RuntimeConfig, driver: Box<dyn ContainerDriver>) -> Self {
        let host_mode = HostMode::from_host(&config.host);

        info!(
            version = env!("CARGO_PKG_VERSION"),
            host = %config.host,
            mode = host_mode.as_str(),
            "Docker backend initialized"
        );
        if config.log_level.is_none() {
            println!(
                "FaaS v{} init for Docker - Host: {}",
                env!("CARGO_PKG_VERSION"),
                config.host
            );
        }

        Self {
            config,
            host_mode,
            driver,
            http: reqwest::Client::new(),
        }
    }

    pub fn host_mode(&self) -> HostMode {
        self.host_mode
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn resolve(&self, image: &str) -> Result<String> {
        resolve_image(image, &self.config.default_runtime)
    }

    /// Start the runtime container for `image` unless it is already running
    pub async fn ensure_runtime_running(&self, image: &str) -> Result<()> {
        let image = self.resolve(image)?;
        let name = encode_runtime_name(&image);

        let running = self.driver.running(RUNTIME_NAME_PREFIX).await?;
        if running.contains(&name) {
            debug!(name = %name, "Runtime already running");
            return Ok(());
        }

        // An exited container still holds the name
        if self.driver.list(RUNTIME_NAME_PREFIX).await?.contains(&name) {
            warn!(name = %name, "Removing stopped runtime container");
            self.driver.stop(&name).await?;
        }

        info!(image = %image, name = %name, "Starting runtime");

        let spec = self.launch_spec(&image, name, host_uid().await?);
        self.driver.start(&spec).await?;

        // No readiness check, the server gets a fixed time to come up
        tokio::time::sleep(Duration::from_secs(self.config.settle_seconds)).await;

        Ok(())
    }

    fn launch_spec(&self, image: &str, name: String, user: String) -> LaunchSpec {
        LaunchSpec {
            name,
            image: image.to_string(),
            entrypoint: self.config.interpreter.clone(),
            command: vec![self.config.container_entrypoint()],
            host_dir: self.config.temp_dir.to_string_lossy().to_string(),
            container_dir: "/tmp".to_string(),
            user,
            host_port: self.config.server_port,
            container_port: self.config.container_port,
        }
    }

    /// Send `payload` to the runtime for `image` and return the activation id.
    /// Memory limits do not apply to these containers, `_memory` is ignored.
    pub async fn invoke(&self, image: &str, _memory: Option<u64>, payload: &Value) -> Result<String> {
        self.ensure_runtime_running(image).await?;

        let url = format!("{}/", self.config.server_url());
        let body = self.http.post(&url).json(payload).send().await?.text().await?;

        let response: InvocationResponse = serde_json::from_str(&body)
            .map_err(|e| RuntimeError::Invocation(format!("{}: {}", e, body)))?;

        debug!(activation_id = %response.activation_id, "Invocation accepted");

        Ok(response.activation_id)
    }

    /// Install the runtime for `image` and return its metadata.
    /// `_timeout` is accepted for parity with other backends and unused.
    pub async fn create_runtime(
        &self,
        image: &str,
        _memory: Option<u64>,
        _timeout: Option<Duration>,
    ) -> Result<RuntimeMetadata> {
        let image = self.resolve(image)?;
        let zip_path = self.config.handler_zip_path();

        info!(image = %image, mode = self.host_mode.as_str(), "Creating runtime");

        package::create_handler_zip(&self.config.handler_dir, &zip_path, &self.config.entrypoint)?;
        let installed = self.install_runtime(&image, &zip_path).await;
        package::remove_handler_zip(&zip_path);
        installed?;

        self.generate_runtime_metadata(&image).await
    }

    async fn install_runtime(&self, image: &str, zip_path: &Path) -> Result<()> {
        if self.host_mode == HostMode::Local {
            package::extract_handler_zip(zip_path, &self.config.runtime_dir())?;
        }

        if let Err(e) = self.driver.pull(image).await {
            error!(image = %image, error = %e, "Runtime pull failed");
            return Err(e);
        }

        Ok(())
    }

    /// Ask the runtime for its preinstalled capabilities
    pub async fn generate_runtime_metadata(&self, image: &str) -> Result<RuntimeMetadata> {
        self.ensure_runtime_running(image).await?;

        let url = format!("{}/preinstalls", self.config.server_url());
        let body = self.http.get(&url).send().await?.text().await?;

        let metadata: RuntimeMetadata = serde_json::from_str(&body)
            .map_err(|e| RuntimeError::Metadata(format!("{}: {}", e, body)))?;

        if !metadata.contains_key(PREINSTALLS_KEY) {
            return Err(RuntimeError::Metadata(body));
        }

        Ok(metadata)
    }

    /// Custom images cannot be built by this backend
    pub async fn build_runtime(&self, image: &str, _dockerfile: Option<&Path>) -> Result<()> {
        Err(RuntimeError::UnsupportedOperation(format!(
            "cannot build {}: use a runtime image built by another backend",
            image
        )))
    }

    /// Stop the runtime for `image`, if any
    pub async fn delete_runtime(&self, image: &str, _memory: Option<u64>) -> Result<()> {
        let image = self.resolve(image)?;
        let name = encode_runtime_name(&image);

        debug!(image = %image, name = %name, "Deleting runtime");

        self.driver.stop(&name).await
    }

    /// Stop every runtime managed by this backend. Individual failures are
    /// logged and skipped.
    pub async fn delete_all_runtimes(&self) -> Result<()> {
        let names = self.driver.list(RUNTIME_NAME_PREFIX).await?;

        for name in names {
            debug!(name = %name, "Deleting runtime");
            if let Err(e) = self.driver.stop(&name).await {
                warn!(name = %name, error = %e, "Failed to delete runtime");
            }
        }

        Ok(())
    }

    /// Runtimes on the host, every one for [`ALL_RUNTIMES`] or only the one
    /// matching `image_filter`
    pub async fn list_runtimes(&self, image_filter: &str) -> Result<Vec<RuntimeEntry>> {
        let wanted = if image_filter == ALL_RUNTIMES {
            None
        } else {
            Some(encode_runtime_name(&self.resolve(image_filter)?))
        };

        let names = self.driver.list(RUNTIME_NAME_PREFIX).await?;

        let runtimes = names
            .into_iter()
            .filter(|name| wanted.as_ref().map_or(true, |w| w == name))
            .filter_map(|name| match decode_runtime_name(&name) {
                Some(image) => Some(RuntimeEntry { image, memory: None }),
                None => {
                    warn!(name = %name, "Skipping container with undecodable name");
                    None
                }
            })
            .collect();

        Ok(runtimes)
    }

    /// Key under which callers record that the runtime is installed
    pub fn get_runtime_key(&self, image: &str, _memory: Option<u64>) -> Result<RuntimeKey> {
        let image = self.resolve(image)?;
        Ok(RuntimeKey::new(&self.config.host, &image))
    }

    /// Current state of the runtime for `image`, queried live
    pub async fn runtime_state(&self, image: &str) -> Result<RuntimeState> {
        let name = encode_runtime_name(&self.resolve(image)?);
        let running = self.driver.running(RUNTIME_NAME_PREFIX).await?;

        if running.contains(&name) {
            Ok(RuntimeState::Running)
        } else {
            Ok(RuntimeState::Absent)
        }
    }
}

/// Numeric id of the invoking user, so files written to the shared
/// directory are not owned by root
async fn host_uid() -> Result<String> {
    let output = Command::new("id").arg("-u").output().await?;

    if !output.status.success() {
        return Err(RuntimeError::RuntimeStart(format!(
            "cannot determine user id: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
