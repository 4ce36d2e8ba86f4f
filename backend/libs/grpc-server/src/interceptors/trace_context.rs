//! W3C trace context adoption
//!
//! A valid incoming `traceparent` is continued; otherwise a new trace id is
//! started so every call can be correlated in the logs.

use tonic::{Request, Status};
use tracing::Span;
use uuid::Uuid;

use super::Interceptor;
use crate::context::TraceContext;

pub const TRACEPARENT_HEADER: &str = "traceparent";

#[derive(Debug, Clone, Copy, Default)]
pub struct TraceInterceptor;

impl Interceptor for TraceInterceptor {
    fn intercept(&self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let trace = request
            .metadata()
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_traceparent)
            .unwrap_or_else(|| TraceContext {
                trace_id: Uuid::new_v4().simple().to_string(),
                parent_id: None,
                sampled: false,
            });

        Span::current().record("trace_id", trace.trace_id.as_str());
        request.extensions_mut().insert(trace);
        Ok(request)
    }
}

/// Parse `00-<trace-id>-<parent-id>-<flags>`
pub fn parse_traceparent(value: &str) -> Option<TraceContext> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let parent_id = parts.next()?;
    let flags = parts.next()?;

    if version.len() != 2 || version == "ff" || !is_lower_hex(version) {
        return None;
    }
    // Version 00 has exactly four fields
    if version == "00" && parts.next().is_some() {
        return None;
    }
    if trace_id.len() != 32 || !is_lower_hex(trace_id) || trace_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if parent_id.len() != 16 || !is_lower_hex(parent_id) || parent_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if flags.len() != 2 || !is_lower_hex(flags) {
        return None;
    }

    let flags = u8::from_str_radix(flags, 16).ok()?;

    Some(TraceContext {
        trace_id: trace_id.to_string(),
        parent_id: Some(parent_id.to_string()),
        sampled: flags & 0x01 == 0x01,
    })
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
