//! Server configuration from the environment.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Environment variable holding the full listen address.
pub const ADDR_VAR: &str = "DOODLEDOCK_ADDR";
/// Environment variable holding only a port; binds all interfaces.
pub const PORT_VAR: &str = "PORT";
/// Port used when nothing is configured.
pub const DEFAULT_PORT: u16 = 3030;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. `DOODLEDOCK_ADDR` wins over `PORT`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ADDR_VAR) {
            let addr = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: ADDR_VAR,
                value: value.clone(),
            })?;
            return Ok(Self { addr });
        }
        if let Some(value) = lookup(PORT_VAR) {
            let port: u16 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: PORT_VAR,
                value: value.clone(),
            })?;
            return Ok(Self {
                addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            });
        }
        Ok(Self::default())
    }
}
