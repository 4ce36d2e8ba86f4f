/// Channel settings shared by every client pool
///
/// One settings block applies to all service kinds; endpoints themselves are
/// discovered at call time and never configured here.
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use crate::PoolError;

/// Default cap on a single decoded response
pub const DEFAULT_MAX_DECODING_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_keepalive_interval_secs() -> u64 {
    30
}

fn default_keepalive_timeout_secs() -> u64 {
    10
}

fn default_max_decoding_message_size() -> usize {
    DEFAULT_MAX_DECODING_MESSAGE_SIZE
}

fn default_lazy() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Per-request deadline in seconds; unset means no deadline
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// HTTP/2 keep-alive interval in seconds
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// HTTP/2 keep-alive timeout in seconds
    #[serde(default = "default_keepalive_timeout_secs")]
    pub keepalive_timeout_secs: u64,

    /// Largest response message a client accepts
    #[serde(default = "default_max_decoding_message_size")]
    pub max_decoding_message_size: usize,

    /// Defer the TCP/HTTP2 handshake to the first call
    #[serde(default = "default_lazy")]
    pub lazy: bool,

    /// Server verification for `https://` endpoints
    #[serde(default)]
    pub tls: Option<ClientTls>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientTls {
    /// CA bundle (PEM) used to verify peers
    pub ca_cert_path: Option<String>,
    /// SNI / verification name override
    pub domain_name: Option<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
            keepalive_interval_secs: default_keepalive_interval_secs(),
            keepalive_timeout_secs: default_keepalive_timeout_secs(),
            max_decoding_message_size: DEFAULT_MAX_DECODING_MESSAGE_SIZE,
            lazy: true,
            tls: None,
        }
    }
}

/// Prefix bare `host:port` endpoints with a plaintext scheme
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

impl ChannelSettings {
    /// Build a tonic endpoint with timeouts, keep-alive and optional TLS
    pub fn make_endpoint(&self, endpoint: &str) -> Result<Endpoint, PoolError> {
        let url = normalize_endpoint(endpoint);

        let mut ep = Endpoint::from_shared(url.clone())
            .map_err(|e| PoolError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .http2_keep_alive_interval(Duration::from_secs(self.keepalive_interval_secs))
            .keep_alive_timeout(Duration::from_secs(self.keepalive_timeout_secs))
            .tcp_nodelay(true);

        if let Some(secs) = self.request_timeout_secs {
            ep = ep.timeout(Duration::from_secs(secs));
        }

        if let (Some(tls), true) = (&self.tls, url.starts_with("https://")) {
            let mut config = ClientTlsConfig::new();

            if let Some(ca_path) = &tls.ca_cert_path {
                let ca_pem = fs::read(ca_path).map_err(|e| PoolError::Tls(format!("{ca_path}: {e}")))?;
                config = config.ca_certificate(Certificate::from_pem(ca_pem));
            }

            if let Some(domain) = &tls.domain_name {
                config = config.domain_name(domain);
            }

            ep = ep
                .tls_config(config)
                .map_err(|e| PoolError::Tls(e.to_string()))?;
        }

        Ok(ep)
    }

    /// Open a channel, lazily or eagerly depending on `lazy`
    pub async fn connect(&self, endpoint: &str) -> Result<Channel, PoolError> {
        let ep = self.make_endpoint(endpoint)?;

        if self.lazy {
            return Ok(ep.connect_lazy());
        }

        ep.connect().await.map_err(|source| PoolError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}
