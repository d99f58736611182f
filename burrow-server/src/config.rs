//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via BURROW_CONFIG)
//! 3. Environment variables

use burrow_protocol::pool::DEFAULT_POOL_CAPACITY;
use burrow_protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Wire buffer pool capacity.
    pub pool_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            max_connections: 1000,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl Config {
    /// Loads configuration from file (if `BURROW_CONFIG` is set), then
    /// applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("BURROW_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies `BURROW_*` environment variable overrides. Unparseable
    /// values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("BURROW_BIND_ADDR") {
            match value.parse() {
                Ok(addr) => self.bind_addr = addr,
                Err(_) => tracing::warn!("ignoring invalid BURROW_BIND_ADDR: {value}"),
            }
        }
        if let Ok(value) = std::env::var("BURROW_MAX_CONNECTIONS") {
            match value.parse() {
                Ok(n) => self.max_connections = n,
                Err(_) => tracing::warn!("ignoring invalid BURROW_MAX_CONNECTIONS: {value}"),
            }
        }
        if let Ok(value) = std::env::var("BURROW_POOL_CAPACITY") {
            match value.parse() {
                Ok(n) => self.pool_capacity = n,
                Err(_) => tracing::warn!("ignoring invalid BURROW_POOL_CAPACITY: {value}"),
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr: 0.0.0.0:9000").unwrap();
        writeln!(file, "max_connections: 7").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.max_connections, 7);
        // Unspecified fields keep their defaults.
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/does/not/exist.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr: [not an address").unwrap();
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }
}
