//! Request-side interceptors
//!
//! Each interceptor inspects or enriches the request metadata and
//! extensions, or rejects the call with a `Status`. The fixed interceptors
//! always run first, in this order:
//!
//! 1. [`user_agent`] - parse the caller's user agent
//! 2. [`token`] - lift the bearer token out of the metadata
//! 3. [`auth`] - verify the token and authorize the method
//! 4. [`trace_context`] - adopt or start a W3C trace
//!
//! Pluggable interceptors ([`metrics`], [`readonly`], or any registered by
//! the composition root) follow, ordered by priority.

pub mod auth;
pub mod metrics;
pub mod readonly;
pub mod token;
pub mod trace_context;
pub mod user_agent;

use tonic::{Request, Status};

pub use auth::{AuthInterceptor, HEALTH_PREFIX, REFLECTION_PREFIXES};
pub use metrics::MetricsInterceptor;
pub use readonly::ReadOnlyInterceptor;
pub use token::TokenExtractor;
pub use trace_context::TraceInterceptor;
pub use user_agent::UserAgentInterceptor;

/// A shared, synchronous request hook
pub trait Interceptor: Send + Sync + 'static {
    fn intercept(&self, request: Request<()>) -> Result<Request<()>, Status>;
}

impl<F> Interceptor for F
where
    F: Fn(Request<()>) -> Result<Request<()>, Status> + Send + Sync + 'static,
{
    fn intercept(&self, request: Request<()>) -> Result<Request<()>, Status> {
        self(request)
    }
}

/// Method path of the call, as recorded by the context layer
pub(crate) fn method_of<T>(request: &Request<T>) -> &str {
    request
        .extensions()
        .get::<crate::context::CallContext>()
        .map(|ctx| ctx.method.as_str())
        .unwrap_or_default()
}
