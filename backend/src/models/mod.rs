//! Data models for the Docker backend
//!
//! Types exchanged with the invocation server and returned to callers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Metadata reported by a runtime about its preinstalled capabilities.
/// Kept opaque apart from the required `preinstalls` key.
pub type RuntimeMetadata = serde_json::Map<String, serde_json::Value>;

/// Key the invocation server must include in its metadata response
pub const PREINSTALLS_KEY: &str = "preinstalls";

/// Response of the invocation server to a POST on `/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "activationId", deserialize_with = "activation_id_text")]
    pub activation_id: String,
}

/// Accept the id as a string or any other non-null JSON scalar
fn activation_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Err(serde::de::Error::custom("activationId is null")),
        other => Ok(other.to_string()),
    }
}

/// A runtime found on the target host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEntry {
    /// Image identifier recovered from the container name
    pub image: String,

    /// Memory is not tracked per container, always `None`
    pub memory: Option<u64>,
}

/// Where container operations are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// Native engine API on this machine
    Local,
    /// Docker CLI subprocesses against a remote daemon
    Remote,
}

impl HostMode {
    /// Classify a configured host address
    pub fn from_host(host: &str) -> Self {
        match host.trim() {
            "127.0.0.1" | "localhost" | "::1" => HostMode::Local,
            _ => HostMode::Remote,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostMode::Local => "local",
            HostMode::Remote => "remote",
        }
    }
}

/// Observed state of a runtime container, always derived live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    Absent,
    Running,
}
