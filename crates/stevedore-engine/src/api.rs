//! Operation groups exposed by a container engine.
//!
//! The build pipeline only depends on these traits, never on a concrete
//! transport, so a fake engine can stand in for the real one in tests.

use crate::error::Result;
use crate::models::{
    CommitOptions, ContainerCreateRequest, ContainerSummary, ExecCreateRequest, ExecInspect,
    ExecStartRequest, IdResponse, ImageConfig,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Raw multiplexed output of an exec session.
pub type OutputStream = BoxStream<'static, Result<Bytes>>;

/// Container lifecycle: list, create, start, stop, delete.
#[async_trait]
pub trait ContainerApi: Send + Sync {
    /// List containers. With `all` set, stopped containers are included.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;

    /// Create a container under the given name.
    async fn create_container(
        &self,
        name: &str,
        config: &ContainerCreateRequest,
    ) -> Result<IdResponse>;

    /// Start a container. Starting a running container is not an error.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop a container. Stopping a stopped container is not an error.
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Delete a stopped container.
    async fn delete_container(&self, id: &str) -> Result<()>;
}

/// Image lifecycle.
#[async_trait]
pub trait ImageApi: Send + Sync {
    /// Freeze a container's filesystem and the given run configuration into
    /// a new image.
    async fn commit_container(
        &self,
        options: &CommitOptions,
        config: &ImageConfig,
    ) -> Result<IdResponse>;
}

/// Exec lifecycle: create, start with an attached stream, inspect.
#[async_trait]
pub trait ExecApi: Send + Sync {
    /// Create an exec session inside a running container.
    async fn create_exec(&self, container: &str, config: &ExecCreateRequest)
        -> Result<IdResponse>;

    /// Start an exec session and return its output stream.
    async fn start_exec(&self, exec_id: &str, config: &ExecStartRequest) -> Result<OutputStream>;

    /// Inspect an exec session.
    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect>;
}

/// A full engine connection: all three operation groups.
pub trait Engine: ContainerApi + ImageApi + ExecApi {}

impl<T: ContainerApi + ImageApi + ExecApi> Engine for T {}
