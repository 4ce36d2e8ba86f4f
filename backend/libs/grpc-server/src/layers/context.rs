use http::HeaderValue;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::context::CallContext;

/// Header correlating a call across services and logs
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Attaches a [`CallContext`] to every call and echoes its request id
///
/// A caller-supplied `x-request-id` is kept; otherwise a fresh one is
/// generated and added to the request headers as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextLayer;

impl<S> Layer<S> for ContextLayer {
    type Service = ContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct ContextService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for ContextService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<ReqBody>) -> Self::Future {
        let supplied = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let request_id = match supplied {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                if let Ok(value) = HeaderValue::from_str(&id) {
                    req.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                id
            }
        };

        let header = HeaderValue::from_str(&request_id).ok();
        let method = req.uri().path().to_string();
        req.extensions_mut()
            .insert(CallContext::new(method, request_id));

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.await?;
            if let Some(value) = header {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}
