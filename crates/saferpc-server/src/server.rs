//! HTTP transport for [`RpcEndpoint`]
//!
//! Serves JSON-RPC over `POST <rpc_path>` plus the optional `GET /health`
//! and `GET /metrics` side endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::context::TransportRequest;
use crate::endpoint::RpcEndpoint;
use crate::error::Result;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path for the JSON-RPC endpoint
    pub rpc_path: String,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Serve `GET /health`
    pub enable_health: bool,
    /// Serve `GET /metrics`
    pub enable_metrics: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rpc_path: "/rpc".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            enable_health: true,
            enable_metrics: false,
        }
    }
}

/// Builder for [`RpcHttpServer`]
pub struct RpcHttpServerBuilder {
    config: HttpServerConfig,
    endpoint: Arc<RpcEndpoint>,
}

impl RpcHttpServerBuilder {
    pub fn new(endpoint: Arc<RpcEndpoint>) -> Self {
        Self {
            config: HttpServerConfig::default(),
            endpoint,
        }
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.config.rpc_path = path.into();
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn health(mut self, enable: bool) -> Self {
        self.config.enable_health = enable;
        self
    }

    pub fn metrics(mut self, enable: bool) -> Self {
        self.config.enable_metrics = enable;
        self
    }

    pub fn build(self) -> RpcHttpServer {
        RpcHttpServer {
            config: Arc::new(self.config),
            endpoint: self.endpoint,
        }
    }
}

/// JSON-RPC HTTP server
#[derive(Clone)]
pub struct RpcHttpServer {
    config: Arc<HttpServerConfig>,
    endpoint: Arc<RpcEndpoint>,
}

impl RpcHttpServer {
    pub fn builder(endpoint: Arc<RpcEndpoint>) -> RpcHttpServerBuilder {
        RpcHttpServerBuilder::new(endpoint)
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Bind the configured address and serve forever
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("JSON-RPC server listening on {}", listener.local_addr()?);
        info!("JSON-RPC endpoint available at: {}", self.config.rpc_path);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let server = self.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req, peer_addr).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<hyper::body::Incoming>,
        peer_addr: SocketAddr,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("Handling {} {}", method, path);

        let response = if path == self.config.rpc_path {
            if method == Method::POST {
                self.handle_rpc(req, peer_addr).await
            } else {
                let mut response = plain_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("POST"));
                response
            }
        } else if path == "/health" && self.config.enable_health && method == Method::GET {
            json_response(StatusCode::OK, &json!({"status": "ok"}))
        } else if path == "/metrics" && self.config.enable_metrics && method == Method::GET {
            json_response(StatusCode::OK, &self.endpoint.metrics())
        } else {
            plain_response(StatusCode::NOT_FOUND, "Not Found")
        };

        Ok(response)
    }

    async fn handle_rpc(
        &self,
        req: Request<hyper::body::Incoming>,
        peer_addr: SocketAddr,
    ) -> Response<Full<Bytes>> {
        if let Some(content_type) = req.headers().get(CONTENT_TYPE)
            && !content_type
                .to_str()
                .is_ok_and(|ct| ct.starts_with("application/json"))
        {
            return plain_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected application/json");
        }

        let (parts, body) = req.into_parts();
        let bytes = match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                debug!("Rejecting body over {} bytes", self.config.max_body_size);
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            }
            Err(err) => {
                debug!("Failed to read request body: {}", err);
                return plain_response(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };

        let transport = TransportRequest::from_parts(&parts, Some(peer_addr));
        let outcome = self.endpoint.handle_bytes(&bytes, transport).await;

        let mut response = match &outcome.body {
            Some(body) => json_response(outcome.status, body),
            None => {
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = outcome.status;
                response
            }
        };
        response.headers_mut().extend(outcome.headers);
        response
    }
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to encode response body: {}", err);
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn plain_response(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_server_config_default() {
        let config = HttpServerConfig::default();
        assert_eq!(config.rpc_path, "/rpc");
        assert!(config.enable_health);
        assert!(!config.enable_metrics);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000);
        let server = RpcHttpServer::builder(Arc::new(RpcEndpoint::new()))
            .bind_address(addr)
            .rpc_path("/api/rpc")
            .max_body_size(2048)
            .health(false)
            .metrics(true)
            .build();

        assert_eq!(server.config().bind_address, addr);
        assert_eq!(server.config().rpc_path, "/api/rpc");
        assert_eq!(server.config().max_body_size, 2048);
        assert!(!server.config().enable_health);
        assert!(server.config().enable_metrics);
    }
}
