//! Serves a [`Router`] over HTTP/1.1.
//!
//! Every accepted connection runs on its own tokio task. Each request body is collected up to
//! [`ServerConfig::max_body_size`] bytes within [`ServerConfig::body_read_timeout_secs`], the peer
//! address is attached as a [`RemoteAddr`] extension, and the request is handed to
//! [`Router::dispatch`].

use crate::body::ResponseBody;
use crate::request::RemoteAddr;
use crate::responder::Responder;
use crate::router::Router;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use serde::Deserialize;
use std::convert::Infallible;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Transport settings, deserializable from any serde format.
///
/// Missing fields fall back to their defaults, so an empty table is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub header_read_timeout_secs: u64,
    pub body_read_timeout_secs: u64,
    pub keep_alive: bool,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            header_read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            body_read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            keep_alive: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }

    pub fn body_read_timeout(&self) -> Duration {
        Duration::from_secs(self.body_read_timeout_secs)
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address:?}: {source}")]
    Bind {
        address: Vec<SocketAddr>,
        #[source]
        source: io::Error,
    },
}

pub struct ServerBuilder {
    router: Option<Router>,
    config: ServerConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, config: ServerConfig::default() }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Replaces every setting at once, typically with a deserialized config
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    pub fn header_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.header_read_timeout_secs = timeout.as_secs();
        self
    }

    pub fn body_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.body_read_timeout_secs = timeout.as_secs();
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.max_body_size = max_body_size;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self
            .config
            .address
            .to_socket_addrs()
            .map_err(|source| ServerBuildError::InvalidAddress { address: self.config.address.clone(), source })?
            .collect();

        Ok(Server { router: Arc::new(router), config: Arc::new(self.config), address })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("router", &self.router).field("config", &self.config).finish()
    }
}

#[derive(Debug)]
pub struct Server {
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    address: Vec<SocketAddr>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Installs a stdout subscriber, binds the configured address and serves forever
    pub async fn start(self) -> Result<(), ServerError> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("global tracing subscriber already installed");
        }

        let listener = TcpListener::bind(self.address.as_slice())
            .await
            .map_err(|source| ServerError::Bind { address: self.address.clone(), source })?;

        self.serve(listener).await;
        Ok(())
    }

    /// Accepts connections on `listener` until the task is dropped.
    pub async fn serve(self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(address) => info!(address = %address, routes = self.router.routes().len(), "start listening"),
            Err(e) => warn!(cause = %e, "listening on an unknown address"),
        }

        loop {
            let (tcp_stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);
            let config = Arc::clone(&self.config);

            tokio::spawn(async move {
                let service = service_fn(|request: Request<Incoming>| {
                    let router = Arc::clone(&router);
                    let config = Arc::clone(&config);
                    async move { Ok::<_, Infallible>(handle(&router, &config, remote_addr, request).await) }
                });

                let connection = http1::Builder::new()
                    .timer(TokioTimer::new())
                    .header_read_timeout(config.header_read_timeout())
                    .keep_alive(config.keep_alive)
                    .serve_connection(TokioIo::new(tcp_stream), service);

                match connection.await {
                    Ok(()) => debug!(remote = %remote_addr, "connection closed"),
                    Err(e) => warn!(remote = %remote_addr, cause = %e, "connection closed with error"),
                }
            });
        }
    }
}

async fn handle(
    router: &Router,
    config: &ServerConfig,
    remote_addr: SocketAddr,
    request: Request<Incoming>,
) -> Response<ResponseBody> {
    let (mut parts, body) = request.into_parts();
    parts.extensions.insert(RemoteAddr(remote_addr));

    let collected = tokio::time::timeout(config.body_read_timeout(), Limited::new(body, config.max_body_size).collect());
    let bytes = match collected.await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) if e.is::<LengthLimitError>() => {
            debug!(remote = %remote_addr, limit = config.max_body_size, "request body too large");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n").into_response();
        }
        Ok(Err(e)) => {
            debug!(remote = %remote_addr, cause = %e, "failed to read request body");
            return (StatusCode::BAD_REQUEST, "failed to read request body\n").into_response();
        }
        Err(_) => {
            debug!(remote = %remote_addr, "timed out reading request body");
            return (StatusCode::REQUEST_TIMEOUT, "request body read timed out\n").into_response();
        }
    };

    router.dispatch(Request::from_parts(parts, bytes)).await
}

#[cfg(test)]
mod tests {
    use super::{Server, ServerBuildError, ServerConfig};
    use crate::router::Router;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "127.0.0.1:8080");
        assert_eq!(config.header_read_timeout(), Duration::from_secs(15));
        assert_eq!(config.body_read_timeout(), Duration::from_secs(15));
        assert!(config.keep_alive);
        assert_eq!(config.max_body_size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_config_partial_deserialize() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"address": "0.0.0.0:3000", "keep_alive": false}"#).unwrap();
        assert_eq!(config.address, "0.0.0.0:3000");
        assert!(!config.keep_alive);
        assert_eq!(config.body_read_timeout_secs, 15);

        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_builder_requires_router() {
        assert!(matches!(Server::builder().build(), Err(ServerBuildError::MissingRouter)));
    }

    #[test]
    fn test_builder_rejects_bad_address() {
        let router = Router::builder().build().unwrap();
        let result = Server::builder().router(router).address("not an address").build();
        assert!(matches!(result, Err(ServerBuildError::InvalidAddress { .. })));
    }

    #[test]
    fn test_builder_applies_settings() {
        let router = Router::builder().build().unwrap();
        let server = Server::builder()
            .router(router)
            .address("127.0.0.1:0")
            .body_read_timeout(Duration::from_secs(3))
            .max_body_size(16)
            .build()
            .unwrap();

        assert_eq!(server.config().body_read_timeout_secs, 3);
        assert_eq!(server.config().max_body_size, 16);
        assert!(server.router().routes().is_empty());
    }
}
