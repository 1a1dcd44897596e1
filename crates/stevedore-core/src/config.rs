//! Host connector configuration.

use crate::error::CoreError;
use crate::platform::Platform;
use std::path::PathBuf;
use std::time::Duration;
use stevedore_engine::{Endpoint, DEFAULT_ENDPOINT};

/// Default directory holding the host side of defaulted bindings.
pub const DEFAULT_SHARED_ROOT: &str = "./.shared";

/// Configuration for connecting to an engine host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Engine endpoint (`unix:///var/run/docker.sock`, `tcp://host:2375`).
    pub engine: String,
    /// Engine API version to pin requests to (e.g. `v1.41`).
    pub api_version: Option<String>,
    /// Platform of images opened through [`crate::Host::image`].
    pub platform: Platform,
    /// Directory under which default binding directories are created.
    pub shared_root: PathBuf,
    /// Skip TLS certificate validation when fetching remote files.
    pub insecure_fetch: bool,
    /// Timeout for a whole remote fetch (default: none).
    pub fetch_timeout: Option<Duration>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            engine: DEFAULT_ENDPOINT.to_string(),
            api_version: None,
            platform: Platform::default(),
            shared_root: PathBuf::from(DEFAULT_SHARED_ROOT),
            insecure_fetch: false,
            fetch_timeout: None,
        }
    }
}

impl HostConfig {
    /// Create a new config builder.
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STEVEDORE_ENGINE` (falls back to `DOCKER_HOST`) | `unix:///var/run/docker.sock` |
    /// | `STEVEDORE_API_VERSION` | unset |
    /// | `STEVEDORE_PLATFORM` | `linux-x64` |
    /// | `STEVEDORE_SHARED_ROOT` | `./.shared` |
    /// | `STEVEDORE_INSECURE_FETCH` | `false` |
    /// | `STEVEDORE_FETCH_TIMEOUT_SECS` | unset |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let mut config = Self::default();

        if let Some(engine) = lookup("STEVEDORE_ENGINE").or_else(|| lookup("DOCKER_HOST")) {
            config.engine = engine;
        }
        config.api_version = lookup("STEVEDORE_API_VERSION").filter(|v| !v.is_empty());
        if let Some(platform) = lookup("STEVEDORE_PLATFORM") {
            config.platform = platform.parse()?;
        }
        if let Some(root) = lookup("STEVEDORE_SHARED_ROOT") {
            config.shared_root = PathBuf::from(root);
        }
        if let Some(flag) = lookup("STEVEDORE_INSECURE_FETCH") {
            config.insecure_fetch = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(CoreError::Config(format!(
                        "STEVEDORE_INSECURE_FETCH must be a boolean, got '{other}'"
                    )))
                }
            };
        }
        if let Some(secs) = lookup("STEVEDORE_FETCH_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                CoreError::Config(format!(
                    "STEVEDORE_FETCH_TIMEOUT_SECS must be a number of seconds, got '{secs}'"
                ))
            })?;
            config.fetch_timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        Endpoint::parse(&self.engine).map_err(|e| CoreError::Config(e.to_string()))?;
        if self.shared_root.as_os_str().is_empty() {
            return Err(CoreError::Config("shared_root must not be empty".into()));
        }
        if self.fetch_timeout == Some(Duration::ZERO) {
            return Err(CoreError::Config("fetch_timeout must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for HostConfig.
#[derive(Debug, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    /// Set the engine endpoint.
    pub fn engine(mut self, endpoint: impl Into<String>) -> Self {
        self.config.engine = endpoint.into();
        self
    }

    /// Pin the engine API version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = Some(version.into());
        self
    }

    /// Set the default image platform.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    /// Set the shared root for default binding directories.
    pub fn shared_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.shared_root = path.into();
        self
    }

    /// Accept invalid TLS certificates when fetching remote files.
    pub fn insecure_fetch(mut self, insecure: bool) -> Self {
        self.config.insecure_fetch = insecure;
        self
    }

    /// Set the remote fetch timeout.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = Some(timeout);
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<HostConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
