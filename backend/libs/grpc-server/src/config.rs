//! Server configuration
//!
//! ```toml
//! address = "0.0.0.0:19000"
//! shutdown_deadline_secs = 10
//! enable_reflection = true
//!
//! [token]
//! secret = "..."
//!
//! [security]
//! insecure = true
//!
//! [services.health]
//!
//! [interceptors.readonly]
//! allowed_prefixes = ["/pkg.Storage/Stat"]
//!
//! [[method_permissions]]
//! method = "/pkg.Storage/Delete"
//! capabilities = ["delete"]
//! ```

use grpc_clients::ChannelSettings;
use grpc_tls::TransportSecurityConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use token_manager::TokenConfig;

use crate::error::ServerError;
use crate::registry::ConfigBlock;

const DEFAULT_ADDRESS: &str = "0.0.0.0:19000";
const DEFAULT_NETWORK: &str = "tcp";
const DEFAULT_SHUTDOWN_DEADLINE_SECS: u64 = 10;

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_shutdown_deadline_secs() -> u64 {
    DEFAULT_SHUTDOWN_DEADLINE_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port`
    #[serde(default = "default_address")]
    pub address: String,

    /// Only `tcp` is supported
    #[serde(default = "default_network")]
    pub network: String,

    /// How long a graceful stop may wait for in-flight calls
    #[serde(default = "default_shutdown_deadline_secs")]
    pub shutdown_deadline_secs: u64,

    #[serde(default)]
    pub enable_reflection: bool,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub security: TransportSecurityConfig,

    /// Settings for pooled clients to downstream services
    #[serde(default)]
    pub clients: ChannelSettings,

    /// Service name → driver configuration
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEntries>,

    /// Enabled pluggable interceptors and their configuration
    #[serde(default)]
    pub interceptors: BTreeMap<String, ConfigBlock>,

    /// Capabilities some token scope must cover, per method
    #[serde(default)]
    pub method_permissions: Vec<MethodPermission>,
}

/// Capabilities required to call one method
///
/// Kept as an array of tables because method paths contain dots and
/// mixed case, which configuration keys cannot carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodPermission {
    /// Full method path, `/package.Service/Method`
    pub method: String,
    pub capabilities: Vec<String>,
}

impl MethodPermission {
    pub fn new<I, S>(method: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: method.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            network: default_network(),
            shutdown_deadline_secs: DEFAULT_SHUTDOWN_DEADLINE_SECS,
            enable_reflection: false,
            token: TokenConfig::default(),
            security: TransportSecurityConfig::default(),
            clients: ChannelSettings::default(),
            services: BTreeMap::new(),
            interceptors: BTreeMap::new(),
            method_permissions: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.network != DEFAULT_NETWORK {
            return Err(ServerError::Config(format!(
                "unsupported network {:?}, only \"tcp\" is supported",
                self.network
            )));
        }
        if self.address.trim().is_empty() {
            return Err(ServerError::Config("address must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }

    /// Enable `name` with a single driver table
    pub fn with_service(mut self, name: impl Into<String>, block: ConfigBlock) -> Self {
        self.services.insert(name.into(), ServiceEntries::One(block));
        self
    }

    pub fn with_interceptor(mut self, name: impl Into<String>, block: ConfigBlock) -> Self {
        self.interceptors.insert(name.into(), block);
        self
    }
}

/// Driver configuration of one service
///
/// A TOML table (`[services.x]`) is a single driver. An array of tables
/// (`[[services.x]]`) is accepted by the parser but must hold exactly one
/// entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntries {
    Many(Vec<ConfigBlock>),
    One(ConfigBlock),
}

impl ServiceEntries {
    pub fn driver(&self, name: &str) -> Result<&ConfigBlock, ServerError> {
        match self {
            ServiceEntries::One(block) => Ok(block),
            ServiceEntries::Many(blocks) => match blocks.as_slice() {
                [block] => Ok(block),
                [] => Err(ServerError::MissingDriver(name.to_string())),
                _ => Err(ServerError::DuplicateDriver {
                    name: name.to_string(),
                    count: blocks.len(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config: ServerConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.shutdown_deadline(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unix_network_rejected() {
        let config = ServerConfig {
            network: "unix".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_service_entries() {
        let config: ServerConfig = serde_json::from_value(json!({
            "services": {
                "health": {},
                "storage": [{"root": "/a"}],
                "gateway": [{"a": 1}, {"b": 2}],
                "empty": []
            }
        }))
        .unwrap();

        assert!(config.services["health"].driver("health").is_ok());
        assert_eq!(
            config.services["storage"].driver("storage").unwrap()["root"],
            "/a"
        );
        assert!(matches!(
            config.services["gateway"].driver("gateway"),
            Err(ServerError::DuplicateDriver { count: 2, .. })
        ));
        assert!(matches!(
            config.services["empty"].driver("empty"),
            Err(ServerError::MissingDriver(_))
        ));
    }

    #[test]
    fn test_method_permissions_table_array() {
        let config: ServerConfig = serde_json::from_value(json!({
            "method_permissions": [
                {"method": "/pkg.Storage/Delete", "capabilities": ["delete"]}
            ]
        }))
        .unwrap();
        assert_eq!(
            config.method_permissions,
            vec![MethodPermission::new("/pkg.Storage/Delete", ["delete"])]
        );
    }
}
