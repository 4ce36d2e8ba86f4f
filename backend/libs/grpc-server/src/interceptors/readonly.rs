//! Read-only mode: only allow-listed methods are served

use serde::Deserialize;
use std::sync::Arc;
use tonic::{Request, Status};
use tracing::debug;

use super::{method_of, Interceptor, HEALTH_PREFIX};
use crate::registry::{decode_block, ConfigBlock};

pub const DEFAULT_PRIORITY: i32 = 200;

#[derive(Debug, Deserialize)]
struct ReadOnlyConfig {
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default)]
    allowed_prefixes: Vec<String>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// Rejects every method that does not start with an allowed prefix
///
/// Health checks stay reachable regardless of the allow-list.
#[derive(Debug, Clone)]
pub struct ReadOnlyInterceptor {
    allowed_prefixes: Vec<String>,
}

impl ReadOnlyInterceptor {
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// Factory for the `readonly` registry entry
    pub fn factory(block: &ConfigBlock) -> anyhow::Result<(Arc<dyn Interceptor>, i32)> {
        let config: ReadOnlyConfig = decode_block(block)?;
        if config.allowed_prefixes.iter().any(|p| !p.starts_with('/')) {
            anyhow::bail!("allowed_prefixes must be method paths starting with '/'");
        }
        Ok((
            Arc::new(ReadOnlyInterceptor::new(config.allowed_prefixes)),
            config.priority,
        ))
    }

    pub fn allows(&self, method: &str) -> bool {
        method.starts_with(HEALTH_PREFIX)
            || self
                .allowed_prefixes
                .iter()
                .any(|prefix| method.starts_with(prefix.as_str()))
    }
}

impl Interceptor for ReadOnlyInterceptor {
    fn intercept(&self, request: Request<()>) -> Result<Request<()>, Status> {
        let method = method_of(&request);
        if self.allows(method) {
            return Ok(request);
        }

        debug!(method = %method, "rejected in read-only mode");
        Err(Status::permission_denied(format!(
            "{method} is not available in read-only mode"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allow_list() {
        let readonly = ReadOnlyInterceptor::new(vec!["/pkg.Storage/Stat".to_string()]);
        assert!(readonly.allows("/pkg.Storage/Stat"));
        assert!(readonly.allows("/grpc.health.v1.Health/Check"));
        assert!(!readonly.allows("/pkg.Storage/Delete"));
    }

    #[test]
    fn test_factory_rejects_relative_prefix() {
        let err = ReadOnlyInterceptor::factory(&json!({"allowed_prefixes": ["pkg.Storage"]}))
            .err()
            .unwrap();
        assert!(err.to_string().contains("allowed_prefixes"));
    }

    #[test]
    fn test_factory_defaults() {
        let (_, priority) = ReadOnlyInterceptor::factory(&json!({})).unwrap();
        assert_eq!(priority, DEFAULT_PRIORITY);
    }
}
