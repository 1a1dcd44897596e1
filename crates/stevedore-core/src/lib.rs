//! # stevedore-core
//!
//! Programmatic container image builds: open a container from a base image,
//! queue build steps on it, and commit the result as a new image.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      stevedore-core                        │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ImageReference ──open/create──▶ Container ◀── Script      │
//! │        ▲                          │  path()      │ apply() │
//! │        │                          │  host_path() │ cwd()   │
//! │        │                          │  execute()   │ copy()  │
//! │        │                          │  copy()      │ commit()│
//! │        │                          │  fetch()     │         │
//! │        │                          ▼              ▼         │
//! │        │                   BindingTable     Procedure      │
//! │        │                   (cache:, app:)   (RunCommand,   │
//! │        │                                     CopyFile...)  │
//! │        └──────────── commit ◀──────────────────┘           │
//! │                                                            │
//! └────────────────────────────────────────────────────────────┘
//!                              │ Host (Engine trait)
//!                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │          stevedore-engine (engine REST API client)         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use stevedore_core::{Binding, Host, HostConfig, Mounts};
//!
//! # async fn example() -> stevedore_core::Result<()> {
//! let host = Host::connect(HostConfig::from_env()?)?;
//!
//! let mut mounts = Mounts::new();
//! mounts.insert("src".into(), Binding::host("./src"));
//! mounts.insert("app".into(), Binding::defaults());
//!
//! let mut builder = host
//!     .image("node:20-alpine")
//!     .open_container(&host, "app-builder", &mounts)
//!     .await?;
//!
//! let image = builder
//!     .script()
//!     .copy("app:index.mjs", "src:index.mjs")
//!     .copy("app:vendor/lib.tgz", "https://example.com/lib-1.0.tgz")
//!     .cwd("app:")
//!     .execute(["npm", "install", "./vendor/lib.tgz"])
//!     .env("NODE_ENV", "production")
//!     .expose(3000, Some("http"))
//!     .entry(["node", "index.mjs"], Some("serve the app"))
//!     .commit(Some("v1"), Some("my-app"))
//!     .await?;
//!
//! println!("built {image}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Container lifecycle**: idempotent open, deterministic reset, best-effort removal
//! - **Path virtualization**: `scheme:path` references over named bind mounts
//! - **Sequential scripts**: typed procedures queued with a working-directory snapshot
//! - **Fetch cache**: content-addressed downloads shared through the `cache` mount
//! - **Commit**: entry command, ports, environment and working directory baked in

mod bindings;
mod cache;
mod capability;
mod commit;
mod config;
mod container;
mod error;
mod exec;
mod host;
mod image;
mod platform;
mod procedure;
pub mod procedures;
mod script;

pub use bindings::{Binding, BindingTable, Mounts, ResolvedBinding, Side, CACHE_BINDING};
pub use cache::{cache_key, cache_reference, url_extension};
pub use capability::{Capability, ContainerState};
pub use commit::{
    Entry, EntryCommand, ExposedPort, DEFAULT_VERSION, ENTRY_LABEL, PORT_LABEL_PREFIX,
};
pub use config::{HostConfig, HostConfigBuilder, DEFAULT_SHARED_ROOT};
pub use container::Container;
pub use error::{CoreError, Result};
pub use exec::{LineBuffer, INITIAL_POLL_DELAY, MAX_POLL_DELAY};
pub use host::Host;
pub use image::ImageReference;
pub use platform::Platform;
pub use procedure::{Environment, Procedure};
pub use script::Script;
