// spl_gateway/src/config.rs

//! Gateway settings.
//!
//! Settings live in a JSON file (`spl_gateway.json` in the working directory, or the
//! path in `SPL_GATEWAY_CONFIG`). A missing or corrupt file is replaced with the
//! defaults so a fresh install starts with a complete, editable file.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::GatewayError;

pub const CONFIG_FILE_NAME: &str = "spl_gateway.json";
/// Environment variable that overrides the settings file location.
pub const CONFIG_PATH_ENV: &str = "SPL_GATEWAY_CONFIG";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_TCP_PORT: u16 = 5760;
pub const DEFAULT_WS_PORT: u16 = 8080;
pub const DEFAULT_WS_PATH: &str = "/ws";
pub const DEFAULT_SHADOW_PORT: u16 = 5757;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, GatewayError> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| GatewayError::Config(format!("invalid address {}:{}: {}", host, port, e)))
}

/// TCP listener for live ground control stations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_TCP_PORT,
        }
    }
}

impl TcpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, GatewayError> {
        parse_socket_addr(&self.host, self.port)
    }
}

/// WebSocket endpoint for browser-based ground control stations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WebSocketConfig {
    pub host: String,
    pub port: u16,
    /// Route the endpoint is mounted on.
    pub path: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_WS_PORT,
            path: DEFAULT_WS_PATH.to_string(),
        }
    }
}

impl WebSocketConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, GatewayError> {
        parse_socket_addr(&self.host, self.port)
    }
}

/// Shadow TCP server, which answers from the last-known vehicle state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Where the vehicle state is loaded from on start and saved to on stop.
    /// `None` keeps the state in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_SHADOW_PORT,
            snapshot_path: None,
        }
    }
}

impl ShadowConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, GatewayError> {
        parse_socket_addr(&self.host, self.port)
    }
}

/// Capacities of the satellite mobile-terminated (uplink) and mobile-originated
/// (downlink) queues.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub mt_capacity: usize,
    pub mo_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mt_capacity: DEFAULT_QUEUE_CAPACITY,
            mo_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HandlerConfig {
    /// Pause between polls of a channel that had nothing to deliver.
    pub poll_interval_ms: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl HandlerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete gateway configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub tcp: TcpConfig,
    pub websocket: WebSocketConfig,
    pub shadow: ShadowConfig,
    pub queues: QueueConfig,
    pub handler: HandlerConfig,
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the settings file at `path`, writing the defaults there when it is missing
/// or cannot be parsed.
pub fn load_or_create_config(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("[Config] Loaded settings from {:?}", path);
                config
            }
            Err(e) => {
                warn!(
                    "[Config] Settings file {:?} is corrupt ({}), replacing it with defaults",
                    path, e
                );
                let default_config = AppConfig::default();
                save_config(&default_config, path);
                default_config
            }
        },
        Err(e) => {
            info!(
                "[Config] No settings file at {:?} ({}), creating one with defaults",
                path, e
            );
            let default_config = AppConfig::default();
            save_config(&default_config, path);
            default_config
        }
    }
}

/// Resolves the settings file location.
///
/// `SPL_GATEWAY_CONFIG` wins. Otherwise the working directory is used if the file
/// already exists there or the directory is writable, and `~/.config/spl_gateway/`
/// after that.
pub fn get_config_file_path() -> PathBuf {
    if let Ok(explicit) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(explicit);
    }

    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_file_path = current_dir.join(CONFIG_FILE_NAME);
    let dir_writable = fs::metadata(&current_dir)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false);
    if config_file_path.exists() || dir_writable {
        return config_file_path;
    }

    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("spl_gateway")
            .join(CONFIG_FILE_NAME);
    }
    config_file_path
}

/// Writes `config` as pretty JSON. Failures are logged, not returned.
pub fn save_config(config: &AppConfig, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("[Config] Failed to create directory {:?}: {}", parent, e);
                return;
            }
        }
    }

    match serde_json::to_string_pretty(config) {
        Ok(content) => {
            if let Err(e) = fs::write(path, content) {
                warn!("[Config] Failed to write {:?}: {}", path, e);
            } else {
                info!("[Config] Saved settings to {:?}", path);
            }
        }
        Err(e) => warn!("[Config] Failed to serialize settings: {}", e),
    }
}

/// Loads the settings into the process-wide slot. Later calls keep the first value.
pub fn init_config() -> &'static AppConfig {
    let path = get_config_file_path();
    let loaded_config = load_or_create_config(&path);
    if APP_CONFIG.set(loaded_config).is_err() {
        warn!("[Config] init_config called more than once, keeping the existing settings");
    }
    APP_CONFIG.get_or_init(AppConfig::default)
}

/// The settings loaded by [`init_config`].
pub fn get_config() -> Result<&'static AppConfig, GatewayError> {
    APP_CONFIG
        .get()
        .ok_or_else(|| GatewayError::Config("init_config() has not been called".to_string()))
}
