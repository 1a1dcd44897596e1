//! The procedure contract: a pluggable unit of build work.
//!
//! A procedure receives the container it works on, the environment of the
//! step (working directory at the time it was queued) and its typed
//! configuration. It talks to the container only through
//! [`Container::execute`], [`Container::copy`] and [`Container::fetch`], and
//! keeps no state outside the container handle. Expensive idempotent setup
//! is memoized through [`Container::state_mut`].
//!
//! Procedures compose by calling each other's [`Procedure::apply`] directly.

use crate::container::Container;
use crate::error::Result;
use async_trait::async_trait;
use schemars::schema::RootSchema;
use schemars::JsonSchema;

/// Execution environment of one script step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Working directory reference, as set when the step was queued
    pub working_dir: String,
}

impl Environment {
    /// Environment with the given working directory reference.
    pub fn new(working_dir: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

/// A unit of work applied to a container.
#[async_trait]
pub trait Procedure: Send + Sync {
    /// Typed configuration accepted by [`Procedure::apply`].
    type Config: JsonSchema + Send + Sync + 'static;

    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// JSON schema of the configuration.
    fn schema(&self) -> RootSchema {
        schemars::schema_for!(Self::Config)
    }

    /// Apply the procedure to `target`.
    async fn apply(&self, target: &mut Container, env: &Environment, config: &Self::Config)
        -> Result<()>;
}

/// A procedure bundled with its configuration, type-erased for queueing.
#[async_trait]
pub(crate) trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, target: &mut Container, env: &Environment) -> Result<()>;
}

pub(crate) struct Configured<P: Procedure> {
    pub(crate) procedure: P,
    pub(crate) config: P::Config,
}

#[async_trait]
impl<P: Procedure> Task for Configured<P> {
    fn name(&self) -> &'static str {
        self.procedure.name()
    }

    async fn run(&self, target: &mut Container, env: &Environment) -> Result<()> {
        self.procedure.apply(target, env, &self.config).await
    }
}
