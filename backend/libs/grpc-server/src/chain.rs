//! Ordered interceptor chain
//!
//! The fixed interceptors come first in a set order, then the pluggable
//! ones sorted by `(priority, name)`. The chain runs as a single tonic
//! interceptor so the whole sequence sees one request value.

use std::collections::BTreeMap;
use std::sync::Arc;
use tonic::{Request, Status};
use tracing::info;

use crate::error::ServerError;
use crate::interceptors::{
    AuthInterceptor, Interceptor, TokenExtractor, TraceInterceptor, UserAgentInterceptor,
};
use crate::registry::{ConfigBlock, Registry};

struct ChainEntry {
    name: String,
    priority: Option<i32>,
    interceptor: Arc<dyn Interceptor>,
}

#[derive(Clone)]
pub struct InterceptorChain {
    entries: Arc<[ChainEntry]>,
}

impl InterceptorChain {
    /// Interceptor names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every interceptor in order, stopping at the first rejection
    pub fn apply(&self, mut request: Request<()>) -> Result<Request<()>, Status> {
        for entry in self.entries.iter() {
            request = entry.interceptor.intercept(request)?;
        }
        Ok(request)
    }
}

impl tonic::service::Interceptor for InterceptorChain {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        self.apply(request)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.name, e.priority)))
            .finish()
    }
}

/// Instantiate the enabled interceptors and order the full chain
///
/// ## Errors
///
/// - `UnknownInterceptor` when an enabled name has no registered factory
/// - `InterceptorInit` when a factory fails
pub fn build_chain(
    registry: &Registry,
    enabled: &BTreeMap<String, ConfigBlock>,
    auth: AuthInterceptor,
) -> Result<InterceptorChain, ServerError> {
    let mut pluggable = Vec::with_capacity(enabled.len());

    for (name, block) in enabled {
        let factory = registry
            .interceptor(name)
            .ok_or_else(|| ServerError::UnknownInterceptor(name.clone()))?;
        let (interceptor, priority) =
            factory(block).map_err(|e| ServerError::interceptor_init(name, e))?;

        pluggable.push(ChainEntry {
            name: name.clone(),
            priority: Some(priority),
            interceptor,
        });
    }

    // Equal priorities fall back to the name so the order never depends on
    // configuration layout
    pluggable.sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));

    let fixed: [(&str, Arc<dyn Interceptor>); 4] = [
        ("user-agent", Arc::new(UserAgentInterceptor)),
        ("token", Arc::new(TokenExtractor)),
        ("auth", Arc::new(auth)),
        ("tracing", Arc::new(TraceInterceptor)),
    ];

    let entries: Vec<ChainEntry> = fixed
        .into_iter()
        .map(|(name, interceptor)| ChainEntry {
            name: name.to_string(),
            priority: None,
            interceptor,
        })
        .chain(pluggable)
        .collect();

    let chain = InterceptorChain {
        entries: entries.into(),
    };
    info!(order = ?chain.names(), "interceptor chain built");

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use serde_json::json;
    use token_manager::{TokenConfig, TokenManager};

    fn auth() -> AuthInterceptor {
        let tokens = TokenManager::new(TokenConfig::with_secret("chain-test-secret-0123456789abcdef")).unwrap();
        AuthInterceptor::new(tokens, vec!["/open.".to_string()])
    }

    fn marker(tag: &'static str) -> Arc<dyn Interceptor> {
        Arc::new(move |mut request: Request<()>| -> Result<Request<()>, Status> {
            let seen = request
                .metadata()
                .get("x-order")
                .and_then(|v| v.to_str().ok())
                .map(|v| format!("{v},{tag}"))
                .unwrap_or_else(|| tag.to_string());
            request.metadata_mut().insert("x-order", seen.parse().unwrap());
            Ok(request)
        })
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_interceptor("late", |_| Ok((marker("late"), 50)))
            .register_interceptor("b-tied", |_| Ok((marker("b-tied"), 10)))
            .register_interceptor("a-tied", |_| Ok((marker("a-tied"), 10)))
            .register_interceptor("broken", |_| anyhow::bail!("missing backend"));
        registry
    }

    #[test]
    fn test_order() {
        let enabled: BTreeMap<String, ConfigBlock> = ["late", "b-tied", "a-tied"]
            .into_iter()
            .map(|n| (n.to_string(), json!({})))
            .collect();
        let chain = build_chain(&registry(), &enabled, auth()).unwrap();

        assert_eq!(
            chain.names(),
            vec!["user-agent", "token", "auth", "tracing", "a-tied", "b-tied", "late"]
        );

        let mut request = Request::new(());
        request.extensions_mut().insert(CallContext::new("/open.Svc/Get", "r"));
        let request = chain.apply(request).unwrap();
        assert_eq!(
            request.metadata().get("x-order").unwrap().to_str().unwrap(),
            "a-tied,b-tied,late"
        );
    }

    #[test]
    fn test_rejection_stops_chain() {
        let enabled: BTreeMap<String, ConfigBlock> =
            [("late".to_string(), json!({}))].into_iter().collect();
        let chain = build_chain(&registry(), &enabled, auth()).unwrap();

        let mut request = Request::new(());
        request.extensions_mut().insert(CallContext::new("/closed.Svc/Get", "r"));
        let status = chain.apply(request).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn test_unknown_interceptor() {
        let enabled: BTreeMap<String, ConfigBlock> =
            [("ghost".to_string(), json!({}))].into_iter().collect();
        assert!(matches!(
            build_chain(&registry(), &enabled, auth()),
            Err(ServerError::UnknownInterceptor(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_factory_failure_names_interceptor() {
        let enabled: BTreeMap<String, ConfigBlock> =
            [("broken".to_string(), json!({}))].into_iter().collect();
        let err = build_chain(&registry(), &enabled, auth()).unwrap_err();
        assert!(matches!(&err, ServerError::InterceptorInit { name, .. } if name == "broken"));
        assert!(err.to_string().contains("missing backend"));
    }
}
