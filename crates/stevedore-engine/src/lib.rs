//! # stevedore-engine
//!
//! Thin client for the container engine's REST API, as used by the
//! stevedore image build pipeline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stevedore_engine::{ClientBuilder, ContainerApi};
//!
//! # async fn example() -> stevedore_engine::Result<()> {
//! let engine = ClientBuilder::new().build()?;
//! for container in engine.list_containers(true).await? {
//!     println!("{} {:?} {}", container.id, container.names, container.state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Operation traits**: [`ContainerApi`], [`ImageApi`] and [`ExecApi`], so callers
//!   can swap in a fake engine
//! - **Transports**: Unix socket and plain TCP
//! - **Exec output**: [`FrameDecoder`] splits the multiplexed stdout/stderr stream
//! - **Error reasons**: [`EngineError::reason`] extracts the engine's message

mod api;
mod builder;
mod client;
mod error;
mod models;
mod stream;

pub use api::{ContainerApi, Engine, ExecApi, ImageApi, OutputStream};
pub use builder::{ClientBuilder, DEFAULT_ENDPOINT};
pub use client::{Endpoint, EngineClient};
pub use error::{EngineError, Result};
pub use models::{
    percent_encode, CommitOptions, ContainerCreateRequest, ContainerHostConfig, ContainerSummary,
    EmptyObject, ExecCreateRequest, ExecInspect, ExecStartRequest, IdResponse, ImageConfig,
};
pub use stream::{encode_frame, Frame, FrameDecoder, StreamKind, FRAME_HEADER_LEN};
