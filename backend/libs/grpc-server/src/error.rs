//! Startup and serving errors

use grpc_tls::TlsError;
use thiserror::Error;
use token_manager::TokenError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can stop the server from coming up or keep serving
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid server configuration: {0}")]
    Config(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("service {name} has {count} driver configurations, expected exactly one")]
    DuplicateDriver { name: String, count: usize },

    #[error("service {0} has no driver configuration")]
    MissingDriver(String),

    #[error("unknown interceptor: {0}")]
    UnknownInterceptor(String),

    #[error("failed to initialize interceptor {name}: {source}")]
    InterceptorInit {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to initialize service {name}: {source}")]
    ServiceInit {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("transport credentials: {0}")]
    Credentials(#[from] TlsError),

    #[error("token manager: {0}")]
    Token(#[from] TokenError),

    #[error("reflection service: {0}")]
    Reflection(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl ServerError {
    pub(crate) fn interceptor_init(name: &str, source: anyhow::Error) -> Self {
        ServerError::InterceptorInit {
            name: name.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn service_init(name: &str, source: anyhow::Error) -> Self {
        ServerError::ServiceInit {
            name: name.to_string(),
            source: source.into(),
        }
    }
}
