//! gRPC server core
//!
//! Hosts registered services behind one listener:
//! - [`Registry`] of named service and interceptor factories
//! - an ordered interceptor chain with token authentication
//! - tower layers for call context, panic recovery and logging
//! - transport credentials from [`grpc_tls`]
//! - graceful and hard stop through [`ServerHandle`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grpc_server::{register_builtins, Registry, Server, ServerConfig};
//!
//! # async fn run(config: ServerConfig) -> Result<(), grpc_server::ServerError> {
//! let mut registry = Registry::new();
//! register_builtins(&mut registry);
//!
//! let server = Server::new(config, &registry).await?;
//! let handle = server.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.graceful_stop();
//! });
//! server.serve().await
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod interceptors;
pub mod layers;
pub mod registry;
pub mod server;

pub use chain::{build_chain, InterceptorChain};
pub use config::{MethodPermission, ServerConfig, ServiceEntries};
pub use context::{AccessToken, AuthContext, AuthContextExt, CallContext, TraceContext, UserAgent};
pub use error::ServerError;
pub use health::{HealthService, HEALTH_SERVICE};
pub use interceptors::{AuthInterceptor, Interceptor, MetricsInterceptor, ReadOnlyInterceptor};
pub use registry::{
    decode_block, ConfigBlock, InterceptorFactory, Registry, Service, ServiceContext, ServiceFactory,
};
pub use server::{Server, ServerHandle};

/// Registry name of the request counter interceptor
pub const METRICS_INTERCEPTOR: &str = "metrics";

/// Registry name of the read-only interceptor
pub const READONLY_INTERCEPTOR: &str = "readonly";

/// Register the services and interceptors shipped with this crate
pub fn register_builtins(registry: &mut Registry) {
    registry
        .register_service(HEALTH_SERVICE, HealthService::factory)
        .register_interceptor(METRICS_INTERCEPTOR, MetricsInterceptor::factory)
        .register_interceptor(READONLY_INTERCEPTOR, ReadOnlyInterceptor::factory);
}
