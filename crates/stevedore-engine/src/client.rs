//! HTTP client for the engine API.
//!
//! Requests go either over the engine's Unix socket (via hyperlocal) or over
//! plain TCP. Every call is a JSON request/response pair except exec start,
//! which hands back the raw multiplexed output stream.

use crate::api::{ContainerApi, ExecApi, ImageApi, OutputStream};
use crate::error::{EngineError, Result};
use crate::models::{
    percent_encode, CommitOptions, ContainerCreateRequest, ContainerSummary, ExecCreateRequest,
    ExecInspect, ExecStartRequest, IdResponse, ImageConfig,
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, Response, StatusCode};
use hyperlocal::{UnixClientExt, UnixConnector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where the engine API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local Unix domain socket
    Unix(PathBuf),
    /// Plain HTTP on `host:port`
    Tcp(String),
}

impl Endpoint {
    /// Parse an endpoint string.
    ///
    /// Accepted forms: `unix:///path/to/socket`, a bare absolute socket path,
    /// `tcp://host:port` and `http://host:port`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some(path) = value.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(EngineError::Endpoint(format!("missing socket path in '{value}'")));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        for prefix in ["tcp://", "http://"] {
            if let Some(rest) = value.strip_prefix(prefix) {
                let authority = rest.trim_end_matches('/');
                if authority.is_empty() || authority.contains('/') {
                    return Err(EngineError::Endpoint(format!(
                        "expected host:port in '{value}'"
                    )));
                }
                return Ok(Endpoint::Tcp(authority.to_string()));
            }
        }
        if value.starts_with('/') {
            return Ok(Endpoint::Unix(PathBuf::from(value)));
        }
        Err(EngineError::Endpoint(format!(
            "unsupported endpoint '{value}' (expected unix://, tcp:// or http://)"
        )))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp(authority) => write!(f, "tcp://{authority}"),
        }
    }
}

enum Transport {
    Unix(Client<UnixConnector>),
    Tcp(Client<HttpConnector>),
}

/// Connection to a container engine API.
///
/// Cheap to share behind an `Arc`; the underlying hyper clients pool their
/// connections.
pub struct EngineClient {
    endpoint: Endpoint,
    api_version: Option<String>,
    transport: Transport,
}

impl fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl EngineClient {
    /// Connect to the engine at the given endpoint string.
    ///
    /// No request is sent; the first API call opens the connection.
    pub fn connect(endpoint: &str) -> Result<Self> {
        crate::ClientBuilder::new().endpoint(endpoint).build()
    }

    pub(crate) fn new(endpoint: Endpoint, api_version: Option<String>) -> Self {
        let transport = match &endpoint {
            Endpoint::Unix(_) => Transport::Unix(Client::unix()),
            Endpoint::Tcp(_) => Transport::Tcp(Client::new()),
        };
        tracing::debug!(%endpoint, api_version = ?api_version, "Engine client created");
        Self {
            endpoint,
            api_version,
            transport,
        }
    }

    /// Get the endpoint this client talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the pinned API version prefix, if any.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    pub(crate) fn uri(&self, path: &str) -> Result<hyper::Uri> {
        let full = match &self.api_version {
            Some(version) => format!("/{version}{path}"),
            None => path.to_string(),
        };
        match &self.endpoint {
            Endpoint::Unix(socket) => Ok(hyperlocal::Uri::new(socket, &full).into()),
            Endpoint::Tcp(authority) => format!("http://{authority}{full}")
                .parse()
                .map_err(|e| EngineError::Request(format!("invalid request URI for {full}: {e}"))),
        }
    }

    /// Send a request, turning non-success statuses into [`EngineError::Api`].
    ///
    /// `304 Not Modified` counts as success: the engine answers it when a
    /// container is started or stopped twice.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response<Body>> {
        let start = std::time::Instant::now();
        let uri = self.uri(path)?;
        tracing::debug!(%method, path, "Sending engine request");

        let mut builder = Request::builder().method(method.clone()).uri(uri);
        let request_body = match body {
            Some(body) => {
                let json = serde_json::to_string(body)?;
                tracing::trace!(body = %json, "Engine request body");
                builder = builder.header("Content-Type", "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };
        let request = builder
            .body(request_body)
            .map_err(|e| EngineError::Request(format!("failed to build {method} {path}: {e}")))?;

        let response = match &self.transport {
            Transport::Unix(client) => client.request(request).await,
            Transport::Tcp(client) => client.request(request).await,
        }
        .map_err(|e| {
            tracing::error!(%method, path, error = %e, "Engine request failed");
            EngineError::Transport(format!("{method} {path}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_MODIFIED {
            let body_bytes = hyper::body::to_bytes(response.into_body())
                .await
                .unwrap_or_default();
            let body = String::from_utf8_lossy(&body_bytes).into_owned();
            tracing::debug!(%method, path, status = %status, body = %body, "Engine returned an error");
            return Err(EngineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::trace!(
            %method,
            path,
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Engine request completed"
        );
        Ok(response)
    }

    async fn send_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R> {
        let response = self.send(method, path, body).await?;
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        tracing::trace!(response = %String::from_utf8_lossy(&bytes), "Engine response body");
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        let response = self.send::<()>(method, path, None).await?;
        hyper::body::to_bytes(response.into_body()).await?;
        Ok(())
    }
}

#[async_trait]
impl ContainerApi for EngineClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        self.send_json::<(), _>(Method::GET, &format!("/containers/json?all={all}"), None)
            .await
    }

    async fn create_container(
        &self,
        name: &str,
        config: &ContainerCreateRequest,
    ) -> Result<IdResponse> {
        let path = format!("/containers/create?name={}", percent_encode(name));
        let created: IdResponse = self.send_json(Method::POST, &path, Some(config)).await?;
        for warning in created.warnings.iter().flatten() {
            tracing::warn!(container = %name, warning = %warning, "Engine warning on create");
        }
        Ok(created)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.send_empty(Method::POST, &format!("/containers/{}/start", percent_encode(id)))
            .await
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.send_empty(Method::POST, &format!("/containers/{}/stop", percent_encode(id)))
            .await
    }

    async fn delete_container(&self, id: &str) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/containers/{}", percent_encode(id)))
            .await
    }
}

#[async_trait]
impl ImageApi for EngineClient {
    async fn commit_container(
        &self,
        options: &CommitOptions,
        config: &ImageConfig,
    ) -> Result<IdResponse> {
        let path = format!("/commit?{}", options.to_query());
        self.send_json(Method::POST, &path, Some(config)).await
    }
}

#[async_trait]
impl ExecApi for EngineClient {
    async fn create_exec(
        &self,
        container: &str,
        config: &ExecCreateRequest,
    ) -> Result<IdResponse> {
        let path = format!("/containers/{}/exec", percent_encode(container));
        self.send_json(Method::POST, &path, Some(config)).await
    }

    async fn start_exec(&self, exec_id: &str, config: &ExecStartRequest) -> Result<OutputStream> {
        let path = format!("/exec/{}/start", percent_encode(exec_id));
        let response = self.send(Method::POST, &path, Some(config)).await?;
        Ok(response.into_body().map_err(EngineError::from).boxed())
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect> {
        let path = format!("/exec/{}/json", percent_encode(exec_id));
        self.send_json::<(), _>(Method::GET, &path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_endpoint() {
        assert_eq!(
            Endpoint::parse("unix:///var/run/docker.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            Endpoint::parse("/run/user/1000/docker.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/run/user/1000/docker.sock"))
        );
    }

    #[test]
    fn test_parse_tcp_endpoint() {
        assert_eq!(
            Endpoint::parse("tcp://127.0.0.1:2375").unwrap(),
            Endpoint::Tcp("127.0.0.1:2375".into())
        );
        assert_eq!(
            Endpoint::parse("http://localhost:2375/").unwrap(),
            Endpoint::Tcp("localhost:2375".into())
        );
    }

    #[test]
    fn test_parse_rejects_unknown_schemes() {
        assert!(Endpoint::parse("npipe:////./pipe/docker_engine").is_err());
        assert!(Endpoint::parse("unix://").is_err());
        assert!(Endpoint::parse("tcp://host:2375/extra").is_err());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::parse("http://localhost:2375").unwrap();
        assert_eq!(endpoint.to_string(), "tcp://localhost:2375");
    }

    #[tokio::test]
    async fn test_tcp_uri_with_api_version() {
        let client = EngineClient::new(Endpoint::Tcp("localhost:2375".into()), Some("v1.41".into()));
        let uri = client.uri("/containers/json?all=true").unwrap();
        assert_eq!(
            uri.to_string(),
            "http://localhost:2375/v1.41/containers/json?all=true"
        );
    }

    #[tokio::test]
    async fn test_unix_uri_keeps_path() {
        let client = EngineClient::new(Endpoint::Unix(PathBuf::from("/var/run/docker.sock")), None);
        let uri = client.uri("/exec/abc/json").unwrap();
        assert_eq!(uri.path(), "/exec/abc/json");
    }
}
