//! Container handle: a live container plus its resolved bindings.
//!
//! References handed to the handle are `scheme:path` strings. The scheme
//! selects a binding; the path is joined onto that binding's directory.
//!
//! | Reference | Binding | [`Container::path`] | [`Container::host_path`] |
//! |-----------|---------|--------------------|-------------------------|
//! | `cache:/ab.zip` | both sides | `/mnt/cache/ab.zip` | `<shared>/cache/ab.zip` |
//! | `app:bin/tool` | container side only | `<app dir>/bin/tool` | `None` |
//! | `noop:x` | neither side | `/x` | `None` |
//! | `other:x` | not declared | `/x` | `None` |
//! | `/etc/hosts` | no scheme | `/etc/hosts` | `None` |
//!
//! Resolution never fails.

use crate::bindings::{is_absolute, join_host, join_normalized, BindingTable, Mounts};
use crate::cache;
use crate::capability::ContainerState;
use crate::error::{CoreError, Result};
use crate::exec;
use crate::host::Host;
use crate::image::ImageReference;
use crate::platform::Platform;
use crate::script::Script;
use std::path::PathBuf;
use stevedore_engine::{ContainerApi, ContainerCreateRequest, ContainerHostConfig};

/// A running container the build pipeline works on.
pub struct Container {
    name: String,
    host: Host,
    image: ImageReference,
    bindings: BindingTable,
    state: ContainerState,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("bindings", &self.bindings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Open the named container, reusing it if it already exists.
    ///
    /// An existing container is started if it is not running. Otherwise a new
    /// one is created from `image` with the given mounts.
    pub async fn open(host: &Host, image: &ImageReference, name: &str, mounts: &Mounts) -> Result<Self> {
        let start = std::time::Instant::now();
        let bindings = BindingTable::resolve(mounts, image.platform(), host.shared_root())?;
        let engine = host.engine();

        let existing = engine
            .list_containers(true)
            .await
            .map_err(|e| CoreError::engine("failed to list containers", &e))?
            .into_iter()
            .find(|c| c.has_name(name));

        match existing {
            Some(summary) if summary.is_running() => {
                tracing::info!(container = %name, "Reusing running container");
            }
            Some(_) => {
                engine
                    .start_container(name)
                    .await
                    .map_err(|e| CoreError::engine(format!("failed to start container {name}"), &e))?;
                tracing::info!(container = %name, "Restarted existing container");
            }
            None => {
                create_and_start(host, image, name, &bindings).await?;
            }
        }

        tracing::debug!(
            container = %name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Container opened"
        );
        Ok(Self::attach(host, image, name, bindings))
    }

    /// Create the named container from scratch, replacing any existing one.
    pub async fn create(host: &Host, image: &ImageReference, name: &str, mounts: &Mounts) -> Result<Self> {
        let bindings = BindingTable::resolve(mounts, image.platform(), host.shared_root())?;
        remove_container(host, name).await;
        create_and_start(host, image, name, &bindings).await?;
        Ok(Self::attach(host, image, name, bindings))
    }

    fn attach(host: &Host, image: &ImageReference, name: &str, bindings: BindingTable) -> Self {
        Self {
            name: name.to_string(),
            host: host.clone(),
            image: image.clone(),
            bindings,
            state: ContainerState::default(),
        }
    }

    /// Stop and delete this container. Returns whether the delete succeeded.
    pub async fn remove(self) -> bool {
        remove_container(&self.host, &self.name).await
    }

    /// Get the container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the image the container was opened from.
    pub fn image(&self) -> &ImageReference {
        &self.image
    }

    /// Get the container platform.
    pub fn platform(&self) -> Platform {
        self.image.platform()
    }

    /// Get the filesystem root inside the container.
    pub fn root(&self) -> &'static str {
        self.platform().root()
    }

    /// Get the host this container lives on.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Get the resolved bindings.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Get the capability memo.
    pub fn state(&self) -> &ContainerState {
        &self.state
    }

    /// Get the capability memo mutably.
    pub fn state_mut(&mut self) -> &mut ContainerState {
        &mut self.state
    }

    /// Start a build script over this container.
    pub fn script(&mut self) -> Script<'_> {
        Script::for_container(self)
    }

    /// Resolve a reference to a path inside the container.
    pub fn path(&self, reference: &str) -> String {
        let root = self.root();
        match split_scheme(reference) {
            Some((scheme, rest)) => match self.bindings.get(scheme) {
                Some(binding) => match &binding.container {
                    Some(dir) => join_normalized(dir, rest),
                    None => join_normalized(root, rest),
                },
                // undeclared drive letter: an absolute path on its own
                None if scheme.len() == 1 => join_normalized(reference, ""),
                None => join_normalized(root, rest),
            },
            None if is_absolute(reference) => join_normalized(reference, ""),
            None => join_normalized(root, reference),
        }
    }

    /// Resolve a reference to a host path, if its scheme has a host side.
    pub fn host_path(&self, reference: &str) -> Option<PathBuf> {
        let (scheme, rest) = split_scheme(reference)?;
        let dir = self.bindings.get(scheme)?.host.as_ref()?;
        Some(join_host(dir, rest))
    }

    /// Run a command inside the container.
    ///
    /// `working_dir` is a reference; the platform root is used when absent.
    pub async fn execute(&self, argv: &[String], working_dir: Option<&str>) -> Result<()> {
        let dir = match working_dir {
            Some(reference) => self.path(reference),
            None => self.root().to_string(),
        };
        exec::run_command(self.host.engine(), self.platform(), &self.name, argv, &dir).await
    }

    /// Copy the file at reference `source` to reference `dest`, inside the
    /// container.
    ///
    /// When `source` has a host side, the host file must exist.
    pub async fn copy(&self, dest: &str, source: &str) -> Result<()> {
        if let Some(host_file) = self.host_path(source) {
            let exists = tokio::fs::try_exists(&host_file).await.unwrap_or(false);
            if !exists {
                return Err(CoreError::MissingFile(host_file));
            }
        }

        let from = self.path(source);
        let to = self.path(dest);
        tracing::info!(container = %self.name, from = %from, to = %to, "Copying file");
        let argv = self.platform().copy_command(&from, &to);
        self.execute(&argv, None)
            .await
            .map_err(|cause| CoreError::Copy {
                origin: source.to_string(),
                dest: dest.to_string(),
                cause: Box::new(cause),
            })
    }

    /// Download `url` into the cache and return its cache reference.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        self.fetch_as(url, None).await
    }

    /// Like [`Container::fetch`], with an explicit file extension (`.zip`).
    pub async fn fetch_as(&self, url: &str, extension: Option<&str>) -> Result<String> {
        let reference = cache::cache_reference(url, extension);
        let host_file = self.host_path(&reference).ok_or_else(|| CoreError::Fetch {
            url: url.to_string(),
            target: reference.clone(),
            reason: "cache binding has no host directory".to_string(),
        })?;
        cache::ensure_cached(self.host.http(), url, &reference, &host_file).await?;
        Ok(reference)
    }
}

/// Split `scheme:rest`. Schemes follow URI syntax: a letter, then letters,
/// digits, `+`, `-` or `.`.
fn split_scheme(reference: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = reference.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

async fn create_and_start(
    host: &Host,
    image: &ImageReference,
    name: &str,
    bindings: &BindingTable,
) -> Result<()> {
    let engine = host.engine();
    let request = ContainerCreateRequest {
        image: image.name().to_string(),
        entrypoint: Some(image.platform().keep_alive_entrypoint()),
        host_config: Some(ContainerHostConfig {
            binds: bindings.binds(),
        }),
    };

    let created = engine
        .create_container(name, &request)
        .await
        .map_err(|e| CoreError::engine(format!("failed to create container {name}"), &e))?;
    engine
        .start_container(name)
        .await
        .map_err(|e| CoreError::engine(format!("failed to start container {name}"), &e))?;

    tracing::info!(
        container = %name,
        id = %created.id,
        image = %image.name(),
        binds = bindings.binds().len(),
        "Container created"
    );
    Ok(())
}

/// Best-effort stop then delete. Returns whether the delete succeeded.
pub(crate) async fn remove_container(host: &Host, name: &str) -> bool {
    let engine = host.engine();
    if let Err(e) = engine.stop_container(name).await {
        tracing::debug!(container = %name, error = %e, "Stop before removal failed");
    }
    match engine.delete_container(name).await {
        Ok(()) => {
            tracing::info!(container = %name, "Container removed");
            true
        }
        Err(e) => {
            tracing::debug!(container = %name, error = %e, "Container removal failed");
            false
        }
    }
}
