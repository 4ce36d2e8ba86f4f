//! Per-method request counters
//!
//! Counts calls as they enter the pluggable part of the chain, so calls
//! rejected by authentication are not included.

use lazy_static::lazy_static;
use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tonic::{Request, Status};

use super::{method_of, Interceptor};
use crate::registry::{decode_block, ConfigBlock};

pub const DEFAULT_PRIORITY: i32 = 100;

lazy_static! {
    /// Registry holding the server metrics
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    /// Accepted requests by service and method
    pub static ref REQUESTS_TOTAL: IntCounterVec = {
        let counter = IntCounterVec::new(
            opts!("grpc_server_requests_total", "Total gRPC server requests accepted"),
            &["service", "method"],
        )
        .expect("failed to create grpc_server_requests_total metric");
        METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("failed to register grpc_server_requests_total metric");
        counter
    };
}

#[derive(Debug, Deserialize)]
struct MetricsConfig {
    #[serde(default = "default_priority")]
    priority: i32,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsInterceptor;

impl MetricsInterceptor {
    /// Factory for the `metrics` registry entry
    pub fn factory(block: &ConfigBlock) -> anyhow::Result<(Arc<dyn Interceptor>, i32)> {
        let config: MetricsConfig = decode_block(block)?;
        Ok((Arc::new(MetricsInterceptor), config.priority))
    }
}

impl Interceptor for MetricsInterceptor {
    fn intercept(&self, request: Request<()>) -> Result<Request<()>, Status> {
        let (service, method) = split_method(method_of(&request));
        REQUESTS_TOTAL.with_label_values(&[service, method]).inc();
        Ok(request)
    }
}

/// `/pkg.Service/Method` → (`pkg.Service`, `Method`)
fn split_method(path: &str) -> (&str, &str) {
    path.trim_start_matches('/')
        .split_once('/')
        .unwrap_or(("unknown", "unknown"))
}

/// Render all server metrics in the Prometheus text format
pub fn encode_metrics() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&METRICS_REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
