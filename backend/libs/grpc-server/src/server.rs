//! Server bootstrap, serving and shutdown

use grpc_clients::ClientPools;
use grpc_tls::{build_credentials, tls_incoming, Credentials};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::Stream;
use token_manager::TokenManager;
use tonic::codegen::StdError;
use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::server::Connected;
use tonic::transport::Server as TransportServer;
use tracing::{debug, error, info, warn};

use crate::chain::{build_chain, InterceptorChain};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::interceptors::AuthInterceptor;
use crate::layers::{ContextLayer, LoggingLayer, RecoveryLayer};
use crate::registry::{ConfigBlock, Registry, Service, ServiceContext, ServiceFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Running,
    Graceful,
    Immediate,
}

/// Stops a running [`Server`] from another task
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<Shutdown>>,
}

impl ServerHandle {
    /// Stop accepting connections and return without waiting for in-flight
    /// calls
    ///
    /// Connections already accepted are not aborted; their calls may still
    /// complete after the services have been closed.
    pub fn stop(&self) {
        self.shutdown.send_replace(Shutdown::Immediate);
    }

    /// Close the listener and wait for in-flight calls, up to the
    /// configured shutdown deadline
    pub fn graceful_stop(&self) {
        self.shutdown.send_if_modified(|state| {
            if *state == Shutdown::Running {
                *state = Shutdown::Graceful;
                true
            } else {
                false
            }
        });
    }
}

/// Configured services, interceptor chain and credentials, ready to serve
pub struct Server {
    config: ServerConfig,
    services: Vec<(String, Box<dyn Service>)>,
    chain: InterceptorChain,
    credentials: Credentials,
    shutdown: Arc<watch::Sender<Shutdown>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.config.address)
            .field("services", &self.service_names())
            .field("chain", &self.chain)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Server {
    /// Build every configured service and interceptor
    ///
    /// Nothing is bound here; configuration mistakes surface before any
    /// socket is opened.
    pub async fn new(config: ServerConfig, registry: &Registry) -> Result<Self, ServerError> {
        config.validate()?;

        let drivers = resolve_services(&config, registry)?;
        if drivers.is_empty() {
            warn!("no services configured");
        }

        let tokens = TokenManager::new(config.token.clone())?;
        let context = ServiceContext {
            pools: Arc::new(ClientPools::new(config.clients.clone())),
            tokens: tokens.clone(),
        };

        let mut services: Vec<(String, Box<dyn Service>)> = Vec::with_capacity(drivers.len());
        for (name, block, factory) in drivers {
            match factory(block, &context) {
                Ok(service) => {
                    info!(service = %name, "service initialized");
                    services.push((name.to_string(), service));
                }
                Err(e) => {
                    close_services(&services).await;
                    return Err(ServerError::service_init(name, e));
                }
            }
        }

        let (chain, credentials) = match assemble(&config, registry, &services, tokens).await {
            Ok(parts) => parts,
            Err(e) => {
                close_services(&services).await;
                return Err(e);
            }
        };

        let (shutdown, _) = watch::channel(Shutdown::Running);

        Ok(Self {
            config,
            services,
            chain,
            credentials,
            shutdown: Arc::new(shutdown),
        })
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Service names in start and close order
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Bind the configured address and serve until stopped
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.address)
            .await
            .map_err(|e| ServerError::Config(format!("failed to bind {}: {e}", self.config.address)))?;
        self.start(listener).await
    }

    /// Serve on `listener` until a stop is requested, then close services
    pub async fn start(self, listener: TcpListener) -> Result<(), ServerError> {
        let routes = self.routes()?;
        let local_addr = listener.local_addr().ok();

        let Server {
            config,
            services,
            chain,
            credentials,
            shutdown,
        } = self;

        info!(
            address = ?local_addr,
            credentials = credentials.kind(),
            services = services.len(),
            reflection = config.enable_reflection,
            "gRPC server listening"
        );

        let signal = {
            let mut rx = shutdown.subscribe();
            async move {
                let _ = rx.wait_for(|state| *state != Shutdown::Running).await;
                info!("shutdown requested, draining in-flight calls");
            }
        };

        let serving = async move {
            match credentials {
                Credentials::Plaintext => {
                    let incoming = TcpListenerStream::new(listener);
                    serve_routes(TransportServer::builder(), chain, routes, incoming, signal).await
                }
                Credentials::Static(tls) => {
                    let builder = TransportServer::builder().tls_config(tls)?;
                    let incoming = TcpListenerStream::new(listener);
                    serve_routes(builder, chain, routes, incoming, signal).await
                }
                Credentials::Rotating(rotating) => {
                    let incoming = tls_incoming(listener, rotating.acceptor());
                    let result =
                        serve_routes(TransportServer::builder(), chain, routes, incoming, signal).await;
                    // Keeps the renewal task alive for as long as we serve
                    drop(rotating);
                    result
                }
            }
        };

        let result = tokio::select! {
            result = serving => result.map_err(ServerError::from),
            _ = forced_stop(shutdown.subscribe(), config.shutdown_deadline()) => {
                warn!("stopped without waiting for in-flight calls");
                Ok(())
            }
        };

        close_services(&services).await;
        info!("gRPC server stopped");

        result
    }

    fn routes(&self) -> Result<Routes, ServerError> {
        let mut builder = RoutesBuilder::default();
        for (name, service) in &self.services {
            service.register(&mut builder);
            debug!(service = %name, "routes registered");
        }

        if self.config.enable_reflection {
            let descriptor_sets: Vec<&'static [u8]> = self
                .services
                .iter()
                .filter_map(|(_, service)| service.file_descriptor_set())
                .collect();

            builder.add_service(
                reflection_builder(&descriptor_sets)
                    .build_v1()
                    .map_err(|e| ServerError::Reflection(e.to_string()))?,
            );
            builder.add_service(
                reflection_builder(&descriptor_sets)
                    .build_v1alpha()
                    .map_err(|e| ServerError::Reflection(e.to_string()))?,
            );
            info!(descriptor_sets = descriptor_sets.len(), "reflection enabled");
        }

        Ok(builder.routes())
    }
}

/// Authentication, interceptor chain and credentials for the built services
async fn assemble(
    config: &ServerConfig,
    registry: &Registry,
    services: &[(String, Box<dyn Service>)],
    tokens: TokenManager,
) -> Result<(InterceptorChain, Credentials), ServerError> {
    let unprotected: Vec<String> = services
        .iter()
        .flat_map(|(_, service)| service.unprotected_endpoints())
        .collect();

    let auth = AuthInterceptor::new(tokens, unprotected)
        .with_method_permissions(&config.method_permissions)?;
    debug!(unprotected = ?auth.unprotected(), "authentication configured");

    let chain = build_chain(registry, &config.interceptors, auth)?;
    let credentials = build_credentials(&config.security).await?;

    Ok((chain, credentials))
}

fn reflection_builder<'b>(descriptor_sets: &[&'b [u8]]) -> tonic_reflection::server::Builder<'b> {
    descriptor_sets
        .iter()
        .fold(tonic_reflection::server::Builder::configure(), |builder, set| {
            builder.register_encoded_file_descriptor_set(*set)
        })
}

/// Pair each configured service with its factory and single driver block
fn resolve_services<'a>(
    config: &'a ServerConfig,
    registry: &'a Registry,
) -> Result<Vec<(&'a str, &'a ConfigBlock, &'a ServiceFactory)>, ServerError> {
    config
        .services
        .iter()
        .map(|(name, entries)| {
            let block = entries.driver(name)?;
            let factory = registry
                .service(name)
                .ok_or_else(|| ServerError::UnknownService(name.clone()))?;
            Ok((name.as_str(), block, factory))
        })
        .collect()
}

async fn serve_routes<I, IO, IE>(
    builder: TransportServer,
    chain: InterceptorChain,
    routes: Routes,
    incoming: I,
    signal: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IO::ConnectInfo: Clone + Send + Sync + 'static,
    IE: Into<StdError>,
{
    builder
        .layer(ContextLayer)
        .layer(RecoveryLayer)
        .layer(LoggingLayer)
        .layer(tonic::service::interceptor(chain))
        .add_routes(routes)
        .serve_with_incoming_shutdown(incoming, signal)
        .await
}

/// Resolves when `start` must stop waiting for in-flight calls
///
/// An immediate stop resolves at once; a graceful stop resolves after the
/// deadline unless it is upgraded to an immediate stop first.
async fn forced_stop(mut rx: watch::Receiver<Shutdown>, deadline: Duration) {
    let requested = rx
        .wait_for(|state| *state != Shutdown::Running)
        .await
        .map(|state| *state);

    let Ok(requested) = requested else {
        return std::future::pending().await;
    };

    if requested == Shutdown::Graceful {
        let upgraded = tokio::time::timeout(
            deadline,
            rx.wait_for(|state| *state == Shutdown::Immediate),
        )
        .await
        .is_ok();

        if !upgraded {
            warn!(deadline_secs = deadline.as_secs(), "graceful stop deadline exceeded");
        }
    }
}

async fn close_services(services: &[(String, Box<dyn Service>)]) {
    for (name, service) in services {
        match service.close().await {
            Ok(()) => info!(service = %name, "service closed"),
            Err(e) => error!(service = %name, error = %e, "failed to close service"),
        }
    }
}
