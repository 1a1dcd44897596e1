//! Copy a host-reachable file into the container.

use crate::container::Container;
use crate::error::Result;
use crate::procedure::{Environment, Procedure};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configuration of [`CopyFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CopyFileConfig {
    /// Destination reference inside the container (`app:bin/tool`)
    pub dest: String,
    /// Source reference, or an `http(s)://` URL fetched through the cache
    pub source: String,
}

/// Copies a file to a container path, fetching it first if it is remote.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFile;

/// True for sources that must go through the fetch cache.
pub(crate) fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

#[async_trait]
impl Procedure for CopyFile {
    type Config = CopyFileConfig;

    fn name(&self) -> &'static str {
        "copy-file"
    }

    async fn apply(
        &self,
        target: &mut Container,
        _env: &Environment,
        config: &CopyFileConfig,
    ) -> Result<()> {
        let source = if is_remote(&config.source) {
            target.fetch(&config.source).await?
        } else {
            config.source.clone()
        };
        target.copy(&config.dest, &source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/a.zip"));
        assert!(is_remote("HTTP://example.com/a.zip"));
        assert!(!is_remote("cache:/abc.zip"));
        assert!(!is_remote("src:main.rs"));
    }
}
