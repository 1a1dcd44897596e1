//! Built-in procedures.

mod copy;
mod run;

pub use copy::{CopyFile, CopyFileConfig};
pub use run::{RunCommand, RunCommandConfig};
