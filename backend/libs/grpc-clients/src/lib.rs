/// gRPC Clients Library
///
/// Process-wide caches of client channels to downstream services:
/// - one `ConnectionPool` per service kind, keyed by endpoint
/// - lazy channels with bounded response size and a tracing layer
/// - token propagation for outgoing calls
pub mod config;
pub mod kinds;
pub mod pool;
pub mod propagation;
pub mod trace;

use thiserror::Error;

pub use config::{ChannelSettings, ClientTls, DEFAULT_MAX_DECODING_MESSAGE_SIZE};
pub use kinds::*;
pub use pool::{ConnectionPool, PooledClient};
pub use propagation::TokenPropagator;
pub use trace::TracedChannel;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("client TLS configuration error: {0}")]
    Tls(String),
}
