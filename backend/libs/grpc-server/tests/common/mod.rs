//! Shared fixtures: a hand-routed `test.Ping` service and server helpers

#![allow(dead_code)]

use async_trait::async_trait;
use grpc_server::{
    register_builtins, AuthContextExt, Registry, Server, ServerConfig, ServerError, ServerHandle,
    Service,
};
use grpc_tls::TransportSecurityConfig;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use token_manager::{owner_scope, Principal, Scopes, TokenConfig, TokenManager, TOKEN_HEADER};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::BoxFuture;
use tonic::server::{NamedService, UnaryService};
use tonic::service::RoutesBuilder;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

pub const SECRET: &str = "server-test-secret-with-enough-entropy-42";

/// How long `/test.Ping/Slow` takes to answer
pub const SLOW_CALL: std::time::Duration = std::time::Duration::from_secs(3);

#[derive(Clone, Copy)]
enum Handler {
    Ping,
    WhoAmI,
    Panic,
    Slow,
}

impl UnaryService<()> for Handler {
    type Response = ();
    type Future = BoxFuture<Response<()>, Status>;

    fn call(&mut self, request: Request<()>) -> Self::Future {
        let handler = *self;
        Box::pin(async move {
            match handler {
                Handler::Ping => Ok(Response::new(())),
                Handler::WhoAmI => {
                    let username = request.principal()?.username.clone();
                    let mut response = Response::new(());
                    response
                        .metadata_mut()
                        .insert("x-user", username.parse().unwrap());
                    Ok(response)
                }
                Handler::Panic => panic!("handler exploded"),
                Handler::Slow => {
                    tokio::time::sleep(SLOW_CALL).await;
                    Ok(Response::new(()))
                }
            }
        })
    }
}

/// `test.Ping` routed by hand, the way generated servers do it
#[derive(Clone, Default)]
pub struct PingServer;

impl NamedService for PingServer {
    const NAME: &'static str = "test.Ping";
}

impl tower::Service<http::Request<BoxBody>> for PingServer {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        let path = req.uri().path().to_string();
        Box::pin(async move {
            let handler = match path.as_str() {
                "/test.Ping/Ping" => Handler::Ping,
                "/test.Ping/WhoAmI" => Handler::WhoAmI,
                "/test.Ping/Panic" => Handler::Panic,
                "/test.Ping/Slow" => Handler::Slow,
                _ => {
                    return Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", tonic::Code::Unimplemented as i32)
                        .header(http::header::CONTENT_TYPE, "application/grpc")
                        .body(tonic::body::empty_body())
                        .unwrap())
                }
            };

            let mut grpc = tonic::server::Grpc::new(ProstCodec::<(), ()>::default());
            Ok(grpc.unary(handler, req).await)
        })
    }
}

pub struct PingService {
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Service for PingService {
    fn register(&self, routes: &mut RoutesBuilder) {
        routes.add_service(PingServer);
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn registry(closes: Arc<AtomicUsize>) -> Registry {
    let mut registry = Registry::new();
    register_builtins(&mut registry);
    registry.register_service("ping", move |_, _| {
        Ok(Box::new(PingService {
            closes: closes.clone(),
        }) as Box<dyn Service>)
    });
    registry
}

pub fn config() -> ServerConfig {
    ServerConfig {
        shutdown_deadline_secs: 2,
        token: TokenConfig::with_secret(SECRET),
        security: TransportSecurityConfig::insecure(),
        ..Default::default()
    }
    .with_service("health", json!({}))
    .with_service("ping", json!({}))
}

pub fn tokens() -> TokenManager {
    TokenManager::new(TokenConfig::with_secret(SECRET)).unwrap()
}

pub fn owner_token() -> String {
    tokens()
        .mint(&Principal::new("https://idp.test", "u-1", "alice"), &owner_scope())
        .unwrap()
}

pub fn token_with(scopes: &Scopes) -> String {
    tokens()
        .mint(&Principal::new("https://idp.test", "u-2", "bob"), scopes)
        .unwrap()
}

pub struct Running {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub task: JoinHandle<Result<(), ServerError>>,
    pub closes: Arc<AtomicUsize>,
}

impl Running {
    pub async fn channel(&self) -> Channel {
        connect(self.addr).await
    }

    /// Unary call to `test.Ping`, optionally carrying a token
    pub async fn call(&self, method: &'static str, token: Option<&str>) -> Result<Response<()>, Status> {
        call_at(self.addr, method, token).await
    }

    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.handle.graceful_stop();
        tokio::time::timeout(std::time::Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

pub async fn connect(addr: SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

pub async fn call_at(
    addr: SocketAddr,
    method: &'static str,
    token: Option<&str>,
) -> Result<Response<()>, Status> {
    let mut grpc = tonic::client::Grpc::new(connect(addr).await);
    grpc.ready().await.unwrap();

    let mut request = Request::new(());
    if let Some(token) = token {
        request
            .metadata_mut()
            .insert(TOKEN_HEADER, token.parse().unwrap());
    }

    grpc.unary(
        request,
        http::uri::PathAndQuery::from_static(method),
        ProstCodec::<(), ()>::default(),
    )
    .await
}

pub async fn start(config: ServerConfig) -> Running {
    let closes = Arc::new(AtomicUsize::new(0));
    let registry = registry(closes.clone());

    let server = Server::new(config, &registry).await.unwrap();
    let handle = server.handle();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(server.start(listener));

    Running {
        addr,
        handle,
        task,
        closes,
    }
}
