use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};
use tracing::error;

use super::status_response;
use crate::context::CallContext;

/// Turns a panicking handler or interceptor into an `INTERNAL` status
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for RecoveryService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let ctx = req.extensions().get::<CallContext>().cloned();

        let inner = &mut self.inner;
        let fut = match panic::catch_unwind(AssertUnwindSafe(|| inner.call(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                report_panic(ctx.as_ref(), payload.as_ref());
                return Box::pin(futures::future::ready(Ok(internal_response())));
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    report_panic(ctx.as_ref(), payload.as_ref());
                    Ok(internal_response())
                }
            }
        })
    }
}

fn internal_response() -> http::Response<BoxBody> {
    status_response(&Status::internal("internal server error"))
}

fn report_panic(ctx: Option<&CallContext>, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    error!(
        method = ctx.map(|c| c.method.as_str()).unwrap_or_default(),
        request_id = ctx.map(|c| c.request_id.as_str()).unwrap_or_default(),
        panic = %message,
        "handler panicked"
    );
}
