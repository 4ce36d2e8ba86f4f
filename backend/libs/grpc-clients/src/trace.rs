//! Client-side tracing around pooled channels
//!
//! Every outgoing call runs inside a `grpc_client` span carrying the service
//! kind and full method path, so client calls nest under the server span of
//! the request that triggered them.

use std::task::{Context, Poll};
use tonic::transport::Channel;
use tower::Service;
use tracing::instrument::Instrumented;
use tracing::Instrument;

/// Channel wrapper that instruments each request with a span
#[derive(Debug, Clone)]
pub struct TracedChannel<S = Channel> {
    inner: S,
    kind: &'static str,
}

impl<S> TracedChannel<S> {
    pub fn new(inner: S, kind: &'static str) -> Self {
        Self { inner, kind }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, B> Service<http::Request<B>> for TracedChannel<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Instrumented<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let span = tracing::debug_span!(
            "grpc_client",
            rpc.kind = self.kind,
            rpc.method = %req.uri().path(),
        );
        self.inner.call(req).instrument(span)
    }
}
