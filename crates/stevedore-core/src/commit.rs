//! Image committer: freezes a container and its run configuration into a
//! new image.

use crate::container::Container;
use crate::error::{CoreError, Result};
use crate::image::ImageReference;
use crate::platform::Platform;
use std::collections::BTreeMap;
use stevedore_engine::{CommitOptions, ContainerApi, EmptyObject, ImageApi, ImageConfig};

/// Label carrying the documentation of an exposed port.
pub const PORT_LABEL_PREFIX: &str = "stevedore.port.";

/// Label carrying the documentation of the entry command.
pub const ENTRY_LABEL: &str = "stevedore.entry";

/// Default tag of committed images.
pub const DEFAULT_VERSION: &str = "latest";

/// Command an image runs when started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryCommand {
    /// Program and arguments, run directly
    Exec(Vec<String>),
    /// A single command string
    Shell(String),
}

impl From<Vec<String>> for EntryCommand {
    fn from(argv: Vec<String>) -> Self {
        EntryCommand::Exec(argv)
    }
}

impl From<&[&str]> for EntryCommand {
    fn from(argv: &[&str]) -> Self {
        EntryCommand::Exec(argv.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EntryCommand {
    fn from(argv: [&str; N]) -> Self {
        EntryCommand::Exec(argv.iter().map(|s| s.to_string()).collect())
    }
}

impl From<String> for EntryCommand {
    fn from(command: String) -> Self {
        EntryCommand::Shell(command)
    }
}

impl From<&str> for EntryCommand {
    fn from(command: &str) -> Self {
        EntryCommand::Shell(command.to_string())
    }
}

/// A port the image listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedPort {
    /// TCP port number
    pub port: u16,
    /// What the port serves
    pub doc: Option<String>,
}

/// Entry command with its documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The command
    pub command: EntryCommand,
    /// What the command does
    pub doc: Option<String>,
}

/// Everything a commit needs besides the container.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommitPlan {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) entry: Option<Entry>,
    pub(crate) ports: Vec<ExposedPort>,
    pub(crate) env: Vec<(String, String)>,
    /// Resolved container path
    pub(crate) working_dir: String,
}

impl CommitPlan {
    pub(crate) fn image_ref(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    /// Run configuration stored in the committed image.
    pub(crate) fn image_config(&self, platform: Platform) -> ImageConfig {
        let (entrypoint, cmd) = match self.entry.as_ref().map(|e| &e.command) {
            Some(EntryCommand::Exec(argv)) => (Some(argv.clone()), Some(argv.clone())),
            Some(EntryCommand::Shell(line)) => (None, Some(vec![line.clone()])),
            None => (None, None),
        };

        let mut exposed_ports = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for port in &self.ports {
            exposed_ports.insert(format!("{}/tcp", port.port), EmptyObject {});
            if let Some(doc) = &port.doc {
                labels.insert(format!("{PORT_LABEL_PREFIX}{}", port.port), doc.clone());
            }
        }
        if let Some(doc) = self.entry.as_ref().and_then(|e| e.doc.as_ref()) {
            labels.insert(ENTRY_LABEL.to_string(), doc.clone());
        }

        ImageConfig {
            attach_stdin: false,
            attach_stdout: true,
            attach_stderr: true,
            exposed_ports,
            tty: false,
            open_stdin: false,
            stdin_once: false,
            env: self.env.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            entrypoint,
            cmd,
            shell: Some(platform.shell_prefix()),
            image: Some(self.image_ref()),
            working_dir: Some(self.working_dir.clone()),
            labels,
            stop_signal: Some("SIGTERM".to_string()),
            stop_timeout: Some(10),
        }
    }
}

/// Stop `target`, commit it as `plan.name:plan.version` and start it again.
pub(crate) async fn commit_container(target: &Container, plan: &CommitPlan) -> Result<ImageReference> {
    let start = std::time::Instant::now();
    let engine = target.host().engine();
    let name = target.name();
    let image_ref = plan.image_ref();
    tracing::info!(container = %name, image = %image_ref, "Committing container");

    engine
        .stop_container(name)
        .await
        .map_err(|e| CoreError::engine(format!("failed to stop container {name} for commit"), &e))?;

    let options = CommitOptions {
        container: name.to_string(),
        repo: plan.name.clone(),
        tag: plan.version.clone(),
        comment: None,
    };
    let config = plan.image_config(target.platform());
    let committed = engine
        .commit_container(&options, &config)
        .await
        .map_err(|e| CoreError::engine(format!("failed to commit container {name}"), &e))?;

    engine
        .start_container(name)
        .await
        .map_err(|e| CoreError::engine(format!("failed to restart container {name} after commit"), &e))?;

    tracing::info!(
        container = %name,
        image = %image_ref,
        image_id = %committed.id,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Image committed"
    );
    Ok(ImageReference::committed(image_ref, target.platform(), committed.id))
}
