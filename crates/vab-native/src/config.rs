//! Server configuration.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vab_core::VabError;

use crate::frame::DEFAULT_FRAME_BUFFER;

/// TCP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub listen: SocketAddr,
    /// Accept backlog hint. The standard library listener picks its own
    /// backlog; the value is kept for configuration compatibility.
    pub backlog: u32,
    /// Upper bound of one readiness wait.
    pub poll_timeout: Duration,
    /// Interval between readiness probes within a wait.
    pub poll_interval: Duration,
    /// Largest accepted frame body, and the size of one read.
    pub max_frame: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 6998)),
            backlog: 128,
            poll_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
            max_frame: DEFAULT_FRAME_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VabError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| VabError::InvalidConfig(format!("server.toml: {err}").into()))?;
        Self::from_toml(&text)
    }

    /// Parses the configuration from TOML text. Absent keys fall back to
    /// the defaults.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on parse failures or an unparsable listen address.
    pub fn from_toml(text: &str) -> Result<Self, VabError> {
        let raw: ServerToml = toml::from_str(text)
            .map_err(|err| VabError::InvalidConfig(format!("server.toml: {err}").into()))?;
        raw.into_config()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServerToml {
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    listen: Option<String>,
    backlog: Option<u32>,
    poll_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_frame: Option<usize>,
}

impl ServerToml {
    fn into_config(self) -> Result<ServerConfig, VabError> {
        let defaults = ServerConfig::default();
        let listen = match self.server.listen {
            Some(text) => text.parse::<SocketAddr>().map_err(|err| {
                VabError::InvalidConfig(format!("invalid server.listen '{text}': {err}").into())
            })?,
            None => defaults.listen,
        };
        Ok(ServerConfig {
            listen,
            backlog: self.server.backlog.unwrap_or(defaults.backlog),
            poll_timeout: self
                .server
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            poll_interval: self
                .server
                .poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            max_frame: self.server.max_frame.unwrap_or(defaults.max_frame),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config = ServerConfig::from_toml(
            r#"
            [server]
            listen = "0.0.0.0:7001"
            backlog = 64
            poll_timeout_ms = 250
            poll_interval_ms = 5
            max_frame = 8192
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:7001".parse().unwrap());
        assert_eq!(config.backlog, 64);
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.max_frame, 8192);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        let defaults = ServerConfig::default();
        assert_eq!(config.listen, defaults.listen);
        assert_eq!(config.max_frame, DEFAULT_FRAME_BUFFER);
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let err = ServerConfig::from_toml("[server]\nlisten = \"nowhere\"").unwrap_err();
        assert!(matches!(err, VabError::InvalidConfig(_)));
    }
}
