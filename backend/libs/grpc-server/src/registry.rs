//! Named factories for services and interceptors
//!
//! The composition root fills a [`Registry`] before the server is built;
//! configuration then selects entries by name.

use anyhow::Context;
use async_trait::async_trait;
use grpc_clients::ClientPools;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use token_manager::TokenManager;
use tonic::service::RoutesBuilder;
use tracing::warn;

use crate::interceptors::Interceptor;

/// Raw per-service or per-interceptor configuration table
pub type ConfigBlock = serde_json::Value;

/// A gRPC service hosted by the server
#[async_trait]
pub trait Service: Send + Sync {
    /// Add this service's routes
    fn register(&self, routes: &mut RoutesBuilder);

    /// Release resources on shutdown
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Method paths (or path prefixes) callable without a token
    fn unprotected_endpoints(&self) -> Vec<String> {
        Vec::new()
    }

    /// Encoded `FileDescriptorSet` served through reflection
    fn file_descriptor_set(&self) -> Option<&'static [u8]> {
        None
    }
}

/// Shared dependencies handed to every service factory
#[derive(Clone)]
pub struct ServiceContext {
    pub pools: Arc<ClientPools>,
    pub tokens: TokenManager,
}

pub type ServiceFactory =
    Box<dyn Fn(&ConfigBlock, &ServiceContext) -> anyhow::Result<Box<dyn Service>> + Send + Sync>;

/// Builds an interceptor and reports its priority (lower runs earlier)
pub type InterceptorFactory =
    Box<dyn Fn(&ConfigBlock) -> anyhow::Result<(Arc<dyn Interceptor>, i32)> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    services: BTreeMap<String, ServiceFactory>,
    interceptors: BTreeMap<String, InterceptorFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service factory; a second registration under the same
    /// name replaces the first
    pub fn register_service<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ConfigBlock, &ServiceContext) -> anyhow::Result<Box<dyn Service>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if self.services.insert(name.clone(), Box::new(factory)).is_some() {
            warn!(service = %name, "service factory registered twice, keeping the last one");
        }
        self
    }

    pub fn register_interceptor<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ConfigBlock) -> anyhow::Result<(Arc<dyn Interceptor>, i32)> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.interceptors.insert(name.clone(), Box::new(factory)).is_some() {
            warn!(interceptor = %name, "interceptor factory registered twice, keeping the last one");
        }
        self
    }

    pub fn service(&self, name: &str) -> Option<&ServiceFactory> {
        self.services.get(name)
    }

    pub fn interceptor(&self, name: &str) -> Option<&InterceptorFactory> {
        self.interceptors.get(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn interceptor_names(&self) -> impl Iterator<Item = &str> {
        self.interceptors.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("interceptors", &self.interceptors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Decode a configuration block into a typed struct
///
/// An absent block (`null`) decodes like an empty table, so structs with
/// defaulted fields need no configuration at all.
pub fn decode_block<T: DeserializeOwned>(block: &ConfigBlock) -> anyhow::Result<T> {
    let value = if block.is_null() {
        ConfigBlock::Object(Default::default())
    } else {
        block.clone()
    };
    serde_json::from_value(value).context("invalid configuration block")
}
