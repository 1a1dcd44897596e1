//! Request and response shapes of the engine API.
//!
//! Only the fields the build pipeline reads or writes are modelled. Field
//! names follow the engine's PascalCase JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of `GET /containers/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    /// Engine-assigned container id
    pub id: String,
    /// Container names, each prefixed with `/`
    #[serde(default)]
    pub names: Vec<String>,
    /// Image the container was created from
    #[serde(default)]
    pub image: String,
    /// Lifecycle state (`created`, `running`, `exited`...)
    #[serde(default)]
    pub state: String,
}

impl ContainerSummary {
    /// Check whether this container carries the given name.
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }

    /// Check whether the engine reports the container as running.
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateRequest {
    /// Image to create the container from
    pub image: String,
    /// Entrypoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Host-side settings (bind mounts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_config: Option<ContainerHostConfig>,
}

/// Host-side part of a container configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerHostConfig {
    /// Bind mounts in `host:container` form
    #[serde(default)]
    pub binds: Vec<String>,
}

/// Response carrying the id of a created object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdResponse {
    /// Engine-assigned id
    #[serde(rename = "Id", alias = "ID")]
    pub id: String,
    /// Warnings reported during creation
    #[serde(rename = "Warnings", default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

/// Body of `POST /containers/{id}/exec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreateRequest {
    /// Command and arguments
    pub cmd: Vec<String>,
    /// User to run the command as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Working directory inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Attach to stdout
    pub attach_stdout: bool,
    /// Attach to stderr
    pub attach_stderr: bool,
    /// Allocate a pseudo-TTY (disables stream multiplexing)
    pub tty: bool,
}

/// Body of `POST /exec/{id}/start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecStartRequest {
    /// Detach from the command instead of streaming its output
    pub detach: bool,
    /// Allocate a pseudo-TTY
    pub tty: bool,
}

/// Response of `GET /exec/{id}/json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecInspect {
    /// True while the command is still running
    #[serde(default)]
    pub running: bool,
    /// Exit code, once the command has finished
    #[serde(default)]
    pub exit_code: Option<i64>,
}

/// Query parameters of `POST /commit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Container to commit
    pub container: String,
    /// Repository name of the new image
    pub repo: String,
    /// Tag of the new image
    pub tag: String,
    /// Optional commit message
    pub comment: Option<String>,
}

impl CommitOptions {
    /// Render as a URL query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        let mut pairs = vec![
            ("container", self.container.as_str()),
            ("repo", self.repo.as_str()),
            ("tag", self.tag.as_str()),
        ];
        if let Some(comment) = &self.comment {
            pairs.push(("comment", comment.as_str()));
        }
        pairs
            .into_iter()
            .map(|(k, v)| format!("{k}={}", percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Marker for the engine's `{}` set-member values (exposed ports, volumes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Run configuration stored in a committed image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageConfig {
    /// Attach stdin by default
    pub attach_stdin: bool,
    /// Attach stdout by default
    pub attach_stdout: bool,
    /// Attach stderr by default
    pub attach_stderr: bool,
    /// Ports exposed by the image, keyed as `<port>/tcp`
    #[serde(default)]
    pub exposed_ports: BTreeMap<String, EmptyObject>,
    /// Allocate a TTY by default
    pub tty: bool,
    /// Keep stdin open
    pub open_stdin: bool,
    /// Close stdin after the first attach
    pub stdin_once: bool,
    /// Environment in `KEY=VALUE` form
    #[serde(default)]
    pub env: Vec<String>,
    /// Entrypoint
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    /// Default command
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    /// Shell used for shell-form commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<Vec<String>>,
    /// Image reference recorded in the configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Default working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Image labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Signal used to stop containers of this image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,
    /// Seconds to wait before killing on stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<i64>,
}

/// Percent-encode a query value or path segment, leaving RFC 3986 unreserved
/// characters as is.
pub fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
