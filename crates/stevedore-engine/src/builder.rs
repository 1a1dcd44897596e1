//! Builder pattern for configuring an [`EngineClient`].

use crate::client::{EngineClient, Endpoint};
use crate::error::{EngineError, Result};

/// Default engine endpoint on Linux hosts.
pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";

/// Fluent builder for engine connections.
///
/// # Example
///
/// ```no_run
/// use stevedore_engine::{ClientBuilder, ContainerApi};
///
/// # async fn example() -> stevedore_engine::Result<()> {
/// let client = ClientBuilder::new()
///     .endpoint("unix:///var/run/docker.sock")
///     .api_version("v1.41")
///     .build()?;
///
/// let containers = client.list_containers(true).await?;
/// println!("{} containers", containers.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    endpoint: String,
    api_version: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a builder pointing at the default local socket.
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: None,
        }
    }

    /// Set the engine endpoint (`unix://...`, `tcp://host:port`, `http://host:port`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Pin requests to an API version, e.g. `v1.41`.
    ///
    /// A missing leading `v` is added.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.api_version = Some(if version.starts_with('v') {
            version
        } else {
            format!("v{version}")
        });
        self
    }

    /// Parse and return the endpoint without creating a client.
    pub fn build_endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.endpoint)
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns an error if the endpoint or API version cannot be used.
    pub fn build(self) -> Result<EngineClient> {
        let endpoint = self.build_endpoint()?;
        if let Some(version) = &self.api_version {
            let valid = version.len() > 1
                && version[1..].chars().all(|c| c.is_ascii_digit() || c == '.');
            if !valid {
                return Err(EngineError::Endpoint(format!(
                    "invalid API version '{version}'"
                )));
            }
        }
        Ok(EngineClient::new(endpoint, self.api_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_endpoint() {
        let endpoint = ClientBuilder::new().build_endpoint().unwrap();
        assert_eq!(endpoint, Endpoint::Unix(PathBuf::from("/var/run/docker.sock")));
    }

    #[test]
    fn test_api_version_prefix() {
        let builder = ClientBuilder::new().api_version("1.43");
        assert_eq!(builder.api_version.as_deref(), Some("v1.43"));
    }

    #[tokio::test]
    async fn test_build_tcp_client() {
        let client = ClientBuilder::new()
            .endpoint("tcp://127.0.0.1:2375")
            .api_version("v1.41")
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), &Endpoint::Tcp("127.0.0.1:2375".into()));
        assert_eq!(client.api_version(), Some("v1.41"));
    }

    #[test]
    fn test_build_rejects_bad_version() {
        let result = ClientBuilder::new().api_version("latest").build();
        assert!(matches!(result, Err(EngineError::Endpoint(_))));
    }

    #[test]
    fn test_build_rejects_bad_endpoint() {
        let result = ClientBuilder::new().endpoint("ssh://remote").build();
        assert!(result.is_err());
    }
}
