//! # Configuration Management
//!
//! Centralized configuration for the relay server.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()` / `apply_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - The move key is never given a default; without one, encrypted moves are refused
//! - Durations are stored as milliseconds

use crate::error::{ProtocolError, Result};
use crate::registry::DEFAULT_MAX_PLAYERS;
use crate::transport::udp::MAX_DATAGRAM_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default TCP listen address
pub const DEFAULT_TCP_ADDRESS: &str = "0.0.0.0:8080";

/// Default UDP listen address
pub const DEFAULT_UDP_ADDRESS: &str = "0.0.0.0:8081";

/// Top-level relay configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub lobby: LobbyConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `RELAY_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("RELAY_TCP_ADDRESS") {
            self.server.tcp_address = Some(addr).filter(|a| !a.is_empty());
        }

        if let Ok(addr) = std::env::var("RELAY_UDP_ADDRESS") {
            self.server.udp_address = Some(addr).filter(|a| !a.is_empty());
        }

        if let Ok(timeout) = std::env::var("RELAY_SHUTDOWN_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|_| {
                ProtocolError::ConfigError(format!(
                    "RELAY_SHUTDOWN_TIMEOUT_MS is not a number: {timeout}"
                ))
            })?;
            self.server.shutdown_timeout = Duration::from_millis(millis);
        }

        if let Ok(key) = std::env::var("RELAY_MOVE_KEY") {
            self.security.move_key = Some(key).filter(|k| !k.is_empty());
        }

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.lobby.validate());
        errors.extend(self.security.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address; `None` disables the stream listener
    pub tcp_address: Option<String>,

    /// UDP listen address; `None` disables the datagram listener
    pub udp_address: Option<String>,

    /// Receive timeout that lets the UDP loop observe shutdown
    #[serde(with = "duration_serde")]
    pub udp_idle_timeout: Duration,

    /// Receive buffer size and response limit for datagrams
    pub max_datagram_size: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_address: Some(DEFAULT_TCP_ADDRESS.to_string()),
            udp_address: Some(DEFAULT_UDP_ADDRESS.to_string()),
            udp_idle_timeout: Duration::from_millis(500),
            max_datagram_size: MAX_DATAGRAM_SIZE,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.tcp_address.is_none() && self.udp_address.is_none() {
            errors.push("At least one of tcp_address or udp_address must be set".to_string());
        }

        for (name, addr) in [("tcp", &self.tcp_address), ("udp", &self.udp_address)] {
            if let Some(addr) = addr {
                if addr.parse::<std::net::SocketAddr>().is_err() {
                    errors.push(format!(
                        "Invalid {name} address format: '{addr}' (expected format: '0.0.0.0:8080')"
                    ));
                }
            }
        }

        if self.udp_idle_timeout.as_millis() < 10 {
            errors.push("UDP idle timeout too short (minimum: 10ms)".to_string());
        } else if self.udp_idle_timeout.as_secs() > 60 {
            errors.push("UDP idle timeout too long (maximum: 60s)".to_string());
        }

        if self.max_datagram_size < 512 {
            errors.push("Max datagram size too small (minimum: 512 bytes)".to_string());
        } else if self.max_datagram_size > MAX_DATAGRAM_SIZE {
            errors.push(format!(
                "Max datagram size too large: {} (maximum: {MAX_DATAGRAM_SIZE})",
                self.max_datagram_size
            ));
        }

        if self.shutdown_timeout.as_millis() < 100 {
            errors.push("Shutdown timeout too short (minimum: 100ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Matchmaking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Seats per game; the lobby locks when they are all taken
    pub max_players: usize,

    /// Prefix for lobby names created from a player name
    pub name_prefix: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            name_prefix: String::from("Lobby-"),
        }
    }
}

impl LobbyConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_players < 2 {
            errors.push("max_players must be at least 2".to_string());
        } else if self.max_players > 16 {
            errors.push(format!("max_players too large: {} (maximum: 16)", self.max_players));
        }
        errors
    }

    /// Lobby name for a game created by `player`
    pub fn lobby_name(&self, player: &str) -> String {
        format!("{}{player}", self.name_prefix)
    }
}

/// Key material
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// 64 hex characters; enables encrypted move fields
    pub move_key: Option<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("move_key", &self.move_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SecurityConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(key) = &self.move_key {
            if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                errors.push("move_key must be exactly 64 hex characters".to_string());
            }
        }
        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("game-relay"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.to_string().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
