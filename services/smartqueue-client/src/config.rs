//! Configuration types for the SmartQueue client

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub staff: Option<StaffCredentials>,
    #[serde(default)]
    pub notifications: ReconnectConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Where the SmartQueue server lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the raw WebSocket endpoint behind the broker's SockJS mount
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_path: default_ws_path(),
        }
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash
    pub fn http_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// WebSocket URL derived from the HTTP base URL
    pub fn websocket_url(&self) -> crate::Result<String> {
        let base = self.http_base();
        let rest = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(crate::QueueError::Config(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        };
        Ok(format!("{}{}", rest, self.ws_path))
    }
}

/// Staff login submitted to the server's login form
#[derive(Clone, Serialize, Deserialize)]
pub struct StaffCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for StaffCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaffCredentials")
            .field("username", &self.username)
            .finish()
    }
}

/// Reconnect policy for a channel subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect when the session drops or cannot be established
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between reconnect attempts in seconds
    #[serde(default = "default_reconnect_interval")]
    pub interval_seconds: u64,
    /// Maximum number of consecutive failed attempts (None for unlimited)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_reconnect_interval(),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// How long transient staff status messages stay visible
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_duration_clear_ms")]
    pub duration_clear_ms: u64,
    #[serde(default = "default_hours_clear_ms")]
    pub hours_clear_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            duration_clear_ms: default_duration_clear_ms(),
            hours_clear_ms: default_hours_clear_ms(),
        }
    }
}

/// Location of the persisted customer session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SessionConfig {
    /// Configured path, falling back to a file in the system temp directory
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("smartqueue-session.json"))
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_path() -> String {
    "/ws/websocket".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_duration_clear_ms() -> u64 {
    3000
}

fn default_hours_clear_ms() -> u64 {
    4000
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::QueueError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
