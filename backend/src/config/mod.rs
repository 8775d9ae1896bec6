//! Configuration module for the Docker backend
//!
//! Supports configuration via:
//! - YAML/TOML/JSON config files
//! - Environment variables (with FAAS_DOCKER__ prefix)
//! - A `.env` file in the working directory

use std::net::Ipv6Addr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Host running the container engine and the invocation server
    #[serde(default = "default_host")]
    pub host: String,

    /// Log level preference. When unset the init banner also goes to stdout
    #[serde(default)]
    pub log_level: Option<String>,

    /// Host port the invocation server is published on
    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Port the invocation server listens on inside the container
    #[serde(default = "default_port")]
    pub container_port: u16,

    /// Image used when the runtime is requested as "default"
    #[serde(default = "default_runtime")]
    pub default_runtime: String,

    /// Host directory shared with the container as /tmp
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Directory under `temp_dir` holding the extracted handler package
    #[serde(default = "default_runtime_dir_name")]
    pub runtime_dir_name: String,

    /// Directory with the invocation server files to package
    #[serde(default = "default_handler_dir")]
    pub handler_dir: PathBuf,

    /// Entrypoint script inside the handler package
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    /// Program used as container entrypoint to run the script
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Location of the transient handler archive
    #[serde(default)]
    pub handler_zip: Option<PathBuf>,

    /// Seconds to wait after starting a container
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,

    /// Path to the docker CLI (remote mode)
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Docker daemon address passed as `--host` to the CLI (remote mode)
    #[serde(default)]
    pub remote_docker_host: Option<String>,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_runtime() -> String {
    format!("faas/runtime-python:{}", env!("CARGO_PKG_VERSION"))
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_runtime_dir_name() -> String {
    "faas.docker".to_string()
}

fn default_handler_dir() -> PathBuf {
    PathBuf::from("/usr/share/faas/docker-handler")
}

fn default_entrypoint() -> String {
    "__main__.py".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_settle_seconds() -> u64 {
    5
}

fn default_docker_binary() -> String {
    which::which("docker")
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "docker".to_string())
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            log_level: None,
            server_port: default_port(),
            container_port: default_port(),
            default_runtime: default_runtime(),
            temp_dir: default_temp_dir(),
            runtime_dir_name: default_runtime_dir_name(),
            handler_dir: default_handler_dir(),
            entrypoint: default_entrypoint(),
            interpreter: default_interpreter(),
            handler_zip: None,
            settle_seconds: default_settle_seconds(),
            docker_binary: default_docker_binary(),
            remote_docker_host: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&RuntimeConfig::default())?)
            .add_source(config::File::with_name("config/faas-docker").required(false))
            .add_source(config::File::with_name("/etc/faas/docker").required(false))
            .add_source(
                config::Environment::with_prefix("FAAS_DOCKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let runtime_config: RuntimeConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        runtime_config.validate()?;

        Ok(runtime_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("Host cannot be empty");
        }

        if self.server_port == 0 || self.container_port == 0 {
            anyhow::bail!("Ports cannot be 0");
        }

        if self.default_runtime.trim().is_empty() {
            anyhow::bail!("Default runtime image cannot be empty");
        }

        if self.entrypoint.is_empty() || self.entrypoint.contains('/') {
            anyhow::bail!("Entrypoint must be a plain file name");
        }

        Ok(())
    }

    /// Host directory receiving the extracted handler package
    pub fn runtime_dir(&self) -> PathBuf {
        self.temp_dir.join(&self.runtime_dir_name)
    }

    /// Path of the entrypoint script as seen from inside the container
    pub fn container_entrypoint(&self) -> String {
        format!("/tmp/{}/{}", self.runtime_dir_name, self.entrypoint)
    }

    /// Path of the transient handler archive
    pub fn handler_zip_path(&self) -> PathBuf {
        self.handler_zip
            .clone()
            .unwrap_or_else(|| self.temp_dir.join("faas_docker_handler.zip"))
    }

    /// Base URL of the invocation server
    pub fn server_url(&self) -> String {
        let host = self.host.trim();
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("http://[{}]:{}", host, self.server_port)
        } else {
            format!("http://{}:{}", host, self.server_port)
        }
    }
}
