use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tonic::body::BoxBody;
use tonic::codegen::{Body, Bytes, StdError};
use tonic::Code;
use tower::{Layer, Service};
use tracing::{error, field, info, info_span, warn, Instrument};

use crate::context::CallContext;

/// Opens the `grpc_request` span and logs each completed call
///
/// The interceptors run inside the span and fill in `trace_id` and `user`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for LoggingService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display + Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<StdError>,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let (method, request_id) = match req.extensions().get::<CallContext>() {
            Some(ctx) => (ctx.method.clone(), ctx.request_id.clone()),
            None => (req.uri().path().to_string(), String::new()),
        };

        let span = info_span!(
            "grpc_request",
            method = %method,
            request_id = %request_id,
            trace_id = field::Empty,
            user = field::Empty,
        );

        let started = Instant::now();
        let fut = {
            let _entered = span.enter();
            self.inner.call(req)
        };

        Box::pin(
            async move {
                let result = fut.await;
                let latency_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => {
                        let code = response_code(response);
                        match code {
                            Code::Ok => info!(latency_ms, "request completed"),
                            Code::Internal | Code::Unknown | Code::DataLoss | Code::Unavailable => {
                                error!(code = ?code, latency_ms, "request failed")
                            }
                            _ => warn!(code = ?code, latency_ms, "request rejected"),
                        }
                    }
                    Err(e) => error!(error = %e, latency_ms, "transport error"),
                }

                result.map(|response| response.map(tonic::body::boxed))
            }
            .instrument(span),
        )
    }
}

/// Status of a trailers-only response; streamed responses report theirs in
/// trailers and count as OK here
fn response_code<B>(response: &http::Response<B>) -> Code {
    response
        .headers()
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i32>().ok())
        .map(Code::from)
        .unwrap_or(Code::Ok)
}
