//! Image references: the starting point and the product of a build.

use crate::bindings::Mounts;
use crate::container::Container;
use crate::error::Result;
use crate::host::Host;
use crate::platform::Platform;
use crate::script::Script;
use std::fmt;

/// An image known by name, for a given platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    name: String,
    platform: Platform,
    id: Option<String>,
}

impl ImageReference {
    /// Reference an image by name (`alpine:3`, `registry.local/app:v1`).
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            platform,
            id: None,
        }
    }

    pub(crate) fn committed(name: String, platform: Platform, id: String) -> Self {
        Self {
            name,
            platform,
            id: Some(id),
        }
    }

    /// Get the image name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the image platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Engine-assigned image id, known for images produced by a commit.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Open a container from this image, reusing it if it already exists.
    pub async fn open_container(&self, host: &Host, name: &str, mounts: &Mounts) -> Result<Container> {
        Container::open(host, self, name, mounts).await
    }

    /// Create a fresh container from this image, replacing any existing one.
    pub async fn create_container(
        &self,
        host: &Host,
        name: &str,
        mounts: &Mounts,
    ) -> Result<Container> {
        Container::create(host, self, name, mounts).await
    }

    /// Start a build script whose container is created fresh at commit time.
    ///
    /// The container and, by default, the committed image are named `name`.
    pub fn script(&self, host: &Host, name: impl Into<String>) -> Script<'static> {
        Script::for_image(host.clone(), self.clone(), name.into())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
