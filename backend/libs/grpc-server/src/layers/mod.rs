//! Tower layers wrapping every inbound call
//!
//! Outermost first: [`ContextLayer`] → [`RecoveryLayer`] →
//! [`LoggingLayer`], then the interceptor chain and the routes.

pub mod context;
pub mod logging;
pub mod recovery;

pub use context::{ContextLayer, ContextService, REQUEST_ID_HEADER};
pub use logging::{LoggingLayer, LoggingService};
pub use recovery::{RecoveryLayer, RecoveryService};

use http::HeaderValue;
use tonic::body::BoxBody;
use tonic::Status;

/// A trailers-only gRPC response carrying `status`
pub(crate) fn status_response(status: &Status) -> http::Response<BoxBody> {
    let mut response = http::Response::new(tonic::body::empty_body());
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/grpc"),
    );
    if let Err(e) = status.add_header(response.headers_mut()) {
        tracing::error!(error = %e, "failed to encode status headers");
    }
    response
}
