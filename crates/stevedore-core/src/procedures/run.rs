//! Run a command in the step's working directory.

use crate::container::Container;
use crate::error::Result;
use crate::procedure::{Environment, Procedure};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configuration of [`RunCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunCommandConfig {
    /// Program followed by its arguments
    pub args: Vec<String>,
}

/// Runs a command; a non-zero exit fails the step.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCommand;

#[async_trait]
impl Procedure for RunCommand {
    type Config = RunCommandConfig;

    fn name(&self) -> &'static str {
        "run-command"
    }

    async fn apply(
        &self,
        target: &mut Container,
        env: &Environment,
        config: &RunCommandConfig,
    ) -> Result<()> {
        target.execute(&config.args, Some(&env.working_dir)).await
    }
}
