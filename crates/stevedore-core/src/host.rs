//! Host connector: an engine connection plus the host-side settings shared
//! by every container opened through it.

use crate::config::HostConfig;
use crate::error::{CoreError, Result};
use crate::image::ImageReference;
use crate::platform::Platform;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stevedore_engine::{ClientBuilder, ContainerApi, ContainerSummary, Engine};

/// A connection to one engine host.
///
/// Cloning is cheap; clones share the engine connection and HTTP client.
#[derive(Clone)]
pub struct Host {
    engine: Arc<dyn Engine>,
    platform: Platform,
    shared_root: PathBuf,
    http: reqwest::Client,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("platform", &self.platform)
            .field("shared_root", &self.shared_root)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Connect to the engine described by `config`.
    pub fn connect(config: HostConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = ClientBuilder::new().endpoint(config.engine.clone());
        if let Some(version) = &config.api_version {
            builder = builder.api_version(version.clone());
        }
        let client = builder
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        tracing::info!(engine = %config.engine, platform = %config.platform, "Connected to engine host");
        Self::with_engine(Arc::new(client), config)
    }

    /// Build a host over an existing engine implementation.
    pub fn with_engine(engine: Arc<dyn Engine>, config: HostConfig) -> Result<Self> {
        config.validate()?;

        let mut http = reqwest::Client::builder().danger_accept_invalid_certs(config.insecure_fetch);
        if let Some(timeout) = config.fetch_timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build fetch client: {e}")))?;
        if config.insecure_fetch {
            tracing::warn!("TLS certificate validation is disabled for remote fetches");
        }

        let shared_root = if config.shared_root.is_absolute() {
            config.shared_root
        } else {
            std::env::current_dir()?.join(config.shared_root)
        };

        Ok(Self {
            engine,
            platform: config.platform,
            shared_root,
            http,
        })
    }

    /// Get the engine connection.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Get the default image platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Get the absolute shared root for default binding directories.
    pub fn shared_root(&self) -> &Path {
        &self.shared_root
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Reference an image on this host's default platform.
    pub fn image(&self, name: impl Into<String>) -> ImageReference {
        ImageReference::new(name, self.platform)
    }

    /// List all containers on the host, stopped ones included.
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.engine
            .list_containers(true)
            .await
            .map_err(|e| CoreError::engine("failed to list containers", &e))
    }
}
