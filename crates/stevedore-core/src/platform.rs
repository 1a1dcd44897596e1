//! Target platforms and their filesystem and shell conventions.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system and architecture of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Linux on x86-64
    #[default]
    #[serde(rename = "linux-x64")]
    LinuxX64,
    /// Windows on x86-64
    #[serde(rename = "windows-x64")]
    WindowsX64,
}

impl Platform {
    /// Canonical name (`linux-x64`, `windows-x64`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinuxX64 => "linux-x64",
            Platform::WindowsX64 => "windows-x64",
        }
    }

    /// Filesystem root inside containers.
    pub fn root(&self) -> &'static str {
        match self {
            Platform::LinuxX64 => "/",
            Platform::WindowsX64 => "c:/",
        }
    }

    /// Entrypoint that keeps a build container alive between exec sessions.
    pub fn keep_alive_entrypoint(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            Platform::LinuxX64 => &["tail", "-f", "/dev/null"],
            Platform::WindowsX64 => &["cmd.exe", "/c", "ping -t localhost"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }

    /// Shell invocation prefix; the command line follows as one argument.
    pub fn shell_prefix(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            Platform::LinuxX64 => &["/bin/sh", "-c"],
            Platform::WindowsX64 => &["cmd.exe", "/c"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }

    /// User exec sessions run as. `None` keeps the image default.
    pub fn exec_user(&self) -> Option<&'static str> {
        match self {
            Platform::LinuxX64 => None,
            Platform::WindowsX64 => Some("Administrator"),
        }
    }

    /// Build the argv that copies `source` to `dest` inside a container,
    /// creating the destination directory first.
    ///
    /// Both arguments are already resolved container paths.
    pub fn copy_command(&self, source: &str, dest: &str) -> Vec<String> {
        let dir = parent_dir(dest);
        let line = match self {
            Platform::LinuxX64 => format!(
                "mkdir -p {} && cp -f {} {}",
                sh_quote(&dir),
                sh_quote(source),
                sh_quote(dest)
            ),
            Platform::WindowsX64 => {
                let dir = native_windows(&dir);
                format!(
                    "if not exist \"{dir}\" md \"{dir}\" & copy /Y \"{}\" \"{}\"",
                    native_windows(source),
                    native_windows(dest)
                )
            }
        };
        let mut argv = self.shell_prefix();
        argv.push(line);
        argv
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux-x64" | "linux" => Ok(Platform::LinuxX64),
            "windows-x64" | "windows" => Ok(Platform::WindowsX64),
            other => Err(CoreError::Config(format!(
                "unknown platform '{other}' (expected linux-x64 or windows-x64)"
            ))),
        }
    }
}

/// Directory part of a `/`-separated container path.
fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => {
            let dir = &path[..idx];
            // keep the root of a drive path (`c:` -> `c:/`)
            if dir.len() == 2 && dir.ends_with(':') {
                format!("{dir}/")
            } else {
                dir.to_string()
            }
        }
        None => ".".to_string(),
    }
}

fn native_windows(path: &str) -> String {
    path.replace('/', "\\")
}

/// Quote a word for a POSIX shell.
pub(crate) fn sh_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
