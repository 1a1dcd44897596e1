//! Build scripts: an ordered queue of procedures that ends in a commit.
//!
//! A [`Script`] is a by-value builder. Every method consumes the script and
//! returns the next stage, and each queued step captures the working
//! directory current at the time it is queued:
//!
//! ```no_run
//! use stevedore_core::{Container, Result};
//!
//! # async fn build(container: &mut Container) -> Result<()> {
//! let image = container
//!     .script()
//!     .cwd("app:")
//!     .execute(["npm", "ci"])          // runs in app:
//!     .cwd("app:dist")
//!     .execute(["ls", "-l"])           // runs in app:dist
//!     .expose(3000, Some("http"))
//!     .entry(["node", "index.mjs"], None)
//!     .commit(Some("v1"), None)
//!     .await?;
//! println!("built {image}");
//! # Ok(())
//! # }
//! ```
//!
//! Steps run strictly one after another when [`Script::commit`] is awaited.
//! The first failing step aborts the rest and nothing is committed.
//! `commit` consumes the script, so nothing can be queued afterwards:
//!
//! ```compile_fail
//! use stevedore_core::{Container, Result};
//!
//! # async fn build(container: &mut Container) -> Result<()> {
//! let script = container.script().execute(["true"]);
//! script.commit(Some("v1"), None).await?;
//! let _ = script.execute(["false"]);
//! # Ok(())
//! # }
//! ```

use crate::bindings::{Binding, Mounts};
use crate::commit::{self, CommitPlan, Entry, EntryCommand, ExposedPort, DEFAULT_VERSION};
use crate::container::Container;
use crate::error::{CoreError, Result};
use crate::host::Host;
use crate::image::ImageReference;
use crate::procedure::{Configured, Environment, Procedure, Task};
use crate::procedures::{CopyFile, CopyFileConfig, RunCommand, RunCommandConfig};

enum Target<'a> {
    /// An already open container
    Borrowed(&'a mut Container),
    /// A container created fresh from an image at commit time
    Pending {
        host: Host,
        image: ImageReference,
        name: String,
        mounts: Mounts,
    },
}

struct QueuedTask {
    task: Box<dyn Task>,
    working_dir: String,
}

/// An ordered build pipeline over one container.
pub struct Script<'a> {
    target: Target<'a>,
    working_dir: String,
    tasks: Vec<QueuedTask>,
    ports: Vec<ExposedPort>,
    entry: Option<Entry>,
    env: Vec<(String, String)>,
}

impl<'a> Script<'a> {
    pub(crate) fn for_container(container: &'a mut Container) -> Self {
        let working_dir = container.root().to_string();
        Self::with_target(Target::Borrowed(container), working_dir)
    }

    fn with_target(target: Target<'a>, working_dir: String) -> Self {
        Self {
            target,
            working_dir,
            tasks: Vec::new(),
            ports: Vec::new(),
            entry: None,
            env: Vec::new(),
        }
    }

    /// Name of the script: the container name, used as default image name.
    pub fn name(&self) -> &str {
        match &self.target {
            Target::Borrowed(container) => container.name(),
            Target::Pending { name, .. } => name,
        }
    }

    /// Current working directory reference.
    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    /// Number of queued steps.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no step is queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queue a procedure with its configuration.
    pub fn apply<P>(mut self, procedure: P, config: P::Config) -> Self
    where
        P: Procedure + 'static,
    {
        tracing::debug!(
            script = %self.name(),
            procedure = procedure.name(),
            working_dir = %self.working_dir,
            "Queued step"
        );
        self.tasks.push(QueuedTask {
            task: Box::new(Configured { procedure, config }),
            working_dir: self.working_dir.clone(),
        });
        self
    }

    /// Queue a command.
    pub fn execute<I, S>(self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = argv.into_iter().map(Into::into).collect();
        self.apply(RunCommand, RunCommandConfig { args })
    }

    /// Set the working directory reference for the steps queued after this.
    pub fn cwd(mut self, reference: impl Into<String>) -> Self {
        self.working_dir = reference.into();
        self
    }

    /// Queue a copy of `source` (a reference or an `http(s)` URL) to `dest`.
    pub fn copy(self, dest: impl Into<String>, source: impl Into<String>) -> Self {
        let config = CopyFileConfig {
            dest: dest.into(),
            source: source.into(),
        };
        self.apply(CopyFile, config)
    }

    /// Declare a mount for the container created at commit time.
    ///
    /// Has no effect on a script over an already open container.
    pub fn mount(mut self, name: impl Into<String>, binding: Binding) -> Self {
        let name = name.into();
        match &mut self.target {
            Target::Pending { mounts, .. } => {
                mounts.insert(name, binding);
            }
            Target::Borrowed(container) => {
                tracing::warn!(
                    container = %container.name(),
                    binding = %name,
                    "Ignoring mount on an already open container"
                );
            }
        }
        self
    }

    /// Expose a TCP port in the committed image.
    pub fn expose(mut self, port: u16, doc: Option<&str>) -> Self {
        self.ports.retain(|p| p.port != port);
        self.ports.push(ExposedPort {
            port,
            doc: doc.map(str::to_string),
        });
        self
    }

    /// Set the command the committed image runs.
    pub fn entry(mut self, command: impl Into<EntryCommand>, doc: Option<&str>) -> Self {
        self.entry = Some(Entry {
            command: command.into(),
            doc: doc.map(str::to_string),
        });
        self
    }

    /// Set an environment variable in the committed image.
    pub fn env(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.env.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.env.push((key, value)),
        }
        self
    }

    /// Run every queued step in order, then commit the container.
    ///
    /// The image is named `name`, or after the script, and tagged `version`
    /// or `latest`.
    pub async fn commit(self, version: Option<&str>, name: Option<&str>) -> Result<ImageReference> {
        let Script {
            target,
            working_dir,
            tasks,
            ports,
            entry,
            env,
        } = self;

        let mut created;
        let container: &mut Container = match target {
            Target::Borrowed(container) => container,
            Target::Pending {
                host,
                image,
                name,
                mounts,
            } => {
                created = Container::create(&host, &image, &name, &mounts).await?;
                &mut created
            }
        };

        run_tasks(container, tasks).await?;

        let plan = CommitPlan {
            name: name.unwrap_or(container.name()).to_string(),
            version: version.unwrap_or(DEFAULT_VERSION).to_string(),
            entry,
            ports,
            env,
            working_dir: container.path(&working_dir),
        };
        commit::commit_container(container, &plan).await
    }

    pub(crate) fn for_image(host: Host, image: ImageReference, name: String) -> Script<'static> {
        let working_dir = image.platform().root().to_string();
        Script::with_target(
            Target::Pending {
                host,
                image,
                name,
                mounts: Mounts::new(),
            },
            working_dir,
        )
    }
}

async fn run_tasks(container: &mut Container, tasks: Vec<QueuedTask>) -> Result<()> {
    let total = tasks.len();
    for (index, queued) in tasks.into_iter().enumerate() {
        let procedure = queued.task.name();
        let start = std::time::Instant::now();
        tracing::info!(
            container = %container.name(),
            step = index + 1,
            total,
            procedure,
            working_dir = %queued.working_dir,
            "Running step"
        );

        let env = Environment::new(queued.working_dir);
        if let Err(cause) = queued.task.run(container, &env).await {
            tracing::error!(
                container = %container.name(),
                step = index + 1,
                procedure,
                error = %cause,
                "Step failed, aborting script"
            );
            return Err(CoreError::Step {
                index,
                procedure: procedure.to_string(),
                cause: Box::new(cause),
            });
        }

        tracing::debug!(
            step = index + 1,
            procedure,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Step finished"
        );
    }
    Ok(())
}
