//! Built-in `grpc.health.v1.Health` service

use async_trait::async_trait;
use tonic::service::RoutesBuilder;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;
use tracing::info;

use crate::interceptors::HEALTH_PREFIX;
use crate::registry::{ConfigBlock, Service, ServiceContext};

/// Registry name of the health service
pub const HEALTH_SERVICE: &str = "health";

type RegisterFn = Box<dyn Fn(&mut RoutesBuilder) + Send + Sync>;

/// Reports the whole server as `SERVING` until it is closed
pub struct HealthService {
    reporter: HealthReporter,
    register: RegisterFn,
}

impl HealthService {
    pub fn new() -> Self {
        let (reporter, server) = tonic_health::server::health_reporter();
        Self {
            reporter,
            register: Box::new(move |routes: &mut RoutesBuilder| {
                routes.add_service(server.clone());
            }),
        }
    }

    /// Handle for changing per-service status at runtime
    pub fn reporter(&self) -> HealthReporter {
        self.reporter.clone()
    }

    pub fn factory(_block: &ConfigBlock, _ctx: &ServiceContext) -> anyhow::Result<Box<dyn Service>> {
        Ok(Box::new(HealthService::new()))
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for HealthService {
    fn register(&self, routes: &mut RoutesBuilder) {
        (self.register)(routes);
    }

    async fn close(&self) -> anyhow::Result<()> {
        let mut reporter = self.reporter.clone();
        reporter
            .set_service_status("", ServingStatus::NotServing)
            .await;
        info!("health status set to NOT_SERVING");
        Ok(())
    }

    fn unprotected_endpoints(&self) -> Vec<String> {
        vec![HEALTH_PREFIX.to_string()]
    }

    fn file_descriptor_set(&self) -> Option<&'static [u8]> {
        Some(tonic_health::pb::FILE_DESCRIPTOR_SET)
    }
}
