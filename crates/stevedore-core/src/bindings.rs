//! Named bind mounts between the host and a container.
//!
//! A binding gives a scheme name (`cache`, `app`, ...) a host-side directory,
//! a container-side directory, or both. References like `app:out/log.txt`
//! are later resolved against this table by the container handle.
//!
//! Each side of a declaration is one of:
//!
//! | Side | Host | Container |
//! |------|------|-----------|
//! | [`Side::Default`] | `<shared root>/<name>` (created on resolve) | `<platform root>/mnt/<name>` |
//! | [`Side::Path`] | the given path, made absolute | the given path, rooted at the platform root |
//! | [`Side::Absent`] | no host side | no container side |
//!
//! The `cache` binding is always present with both sides defaulted, whatever
//! the caller declares.

use crate::error::Result;
use crate::platform::Platform;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Scheme name of the always-present download cache binding.
pub const CACHE_BINDING: &str = "cache";

/// One side of a binding declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Side {
    /// Use the derived default location
    #[default]
    Default,
    /// Use an explicit path
    Path(String),
    /// No path on this side
    Absent,
}

/// A mount declaration before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    /// Host side
    pub host: Side,
    /// Container side
    pub container: Side,
}

impl Binding {
    /// Both sides at their default locations.
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Explicit host directory, default container directory.
    pub fn host(path: impl Into<String>) -> Self {
        Self {
            host: Side::Path(path.into()),
            container: Side::Default,
        }
    }

    /// Explicit paths on both sides.
    pub fn paths(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: Side::Path(host.into()),
            container: Side::Path(container.into()),
        }
    }

    /// A container directory with no host counterpart.
    pub fn container_only(container: Side) -> Self {
        Self {
            host: Side::Absent,
            container,
        }
    }

    /// A named entry with neither side.
    pub fn none() -> Self {
        Self {
            host: Side::Absent,
            container: Side::Absent,
        }
    }
}

/// Mount declarations keyed by scheme name.
pub type Mounts = BTreeMap<String, Binding>;

/// A binding with concrete paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    /// Absolute host directory
    pub host: Option<PathBuf>,
    /// Normalized container directory
    pub container: Option<String>,
}

/// Resolved bindings of one container. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTable {
    entries: BTreeMap<String, ResolvedBinding>,
}

impl BindingTable {
    /// Resolve mount declarations for a platform.
    ///
    /// Host directories requested with [`Side::Default`] are created under
    /// `shared_root` as a side effect.
    pub fn resolve(mounts: &Mounts, platform: Platform, shared_root: &Path) -> Result<Self> {
        let shared_root = absolutize(shared_root)?;
        let mut entries = BTreeMap::new();

        let forced = (CACHE_BINDING.to_string(), Binding::defaults());
        let declared = mounts
            .iter()
            .filter(|(name, _)| name.as_str() != CACHE_BINDING)
            .map(|(name, binding)| (name.clone(), binding.clone()));

        for (name, binding) in declared.chain(std::iter::once(forced)) {
            let host = match &binding.host {
                Side::Default => {
                    let dir = shared_root.join(&name);
                    std::fs::create_dir_all(&dir)?;
                    tracing::debug!(binding = %name, path = %dir.display(), "Created shared directory");
                    Some(dir)
                }
                Side::Path(path) => Some(absolutize(Path::new(path))?),
                Side::Absent => None,
            };
            let container = match &binding.container {
                Side::Default => Some(join_normalized(platform.root(), &format!("mnt/{name}"))),
                Side::Path(path) if is_absolute(path) => Some(join_normalized(path, "")),
                Side::Path(path) => Some(join_normalized(platform.root(), path)),
                Side::Absent => None,
            };
            entries.insert(name, ResolvedBinding { host, container });
        }

        Ok(Self { entries })
    }

    /// Look up a binding by scheme name.
    pub fn get(&self, name: &str) -> Option<&ResolvedBinding> {
        self.entries.get(name)
    }

    /// Iterate over all bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedBinding)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bindings, the cache included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the cache binding is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Engine bind specs (`host:container`) for bindings with both sides.
    pub fn binds(&self) -> Vec<String> {
        self.entries
            .values()
            .filter_map(|b| match (&b.host, &b.container) {
                (Some(host), Some(container)) => Some(format!("{}:{}", host.display(), container)),
                _ => None,
            })
            .collect()
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// True for `/...`, `\...` and drive-letter (`c:/...`) paths.
pub(crate) fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Join `rel` onto `base` and normalize the result with `/` separators.
///
/// `.` segments and repeated separators are dropped; `..` never climbs
/// above the root of an absolute base.
pub(crate) fn join_normalized(base: &str, rel: &str) -> String {
    let combined = format!("{base}/{rel}").replace('\\', "/");
    let bytes = combined.as_bytes();
    let (prefix, rest) = if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
    {
        (format!("{}/", &combined[..2]), &combined[2..])
    } else if combined.starts_with('/') {
        ("/".to_string(), &combined[1..])
    } else {
        (String::new(), combined.as_str())
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if prefix.is_empty() {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if prefix.is_empty() && body.is_empty() {
        ".".to_string()
    } else {
        format!("{prefix}{body}")
    }
}

/// Join a `/`-separated relative path onto a host directory, staying inside it.
pub(crate) fn join_host(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(&rel.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::ParentDir if depth > 0 => {
                out.pop();
                depth -= 1;
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_always_present() {
        let shared = TempDir::new().unwrap();
        let table = BindingTable::resolve(&Mounts::new(), Platform::LinuxX64, shared.path()).unwrap();

        assert_eq!(table.len(), 1);
        let cache = table.get(CACHE_BINDING).unwrap();
        assert_eq!(cache.host.as_deref(), Some(shared.path().join("cache").as_path()));
        assert_eq!(cache.container.as_deref(), Some("/mnt/cache"));
        assert!(shared.path().join("cache").is_dir());
        assert_eq!(
            table.binds(),
            vec![format!("{}:/mnt/cache", shared.path().join("cache").display())]
        );
    }

    #[test]
    fn test_cache_cannot_be_overridden() {
        let shared = TempDir::new().unwrap();
        let mut mounts = Mounts::new();
        mounts.insert(CACHE_BINDING.into(), Binding::none());
        let table = BindingTable::resolve(&mounts, Platform::WindowsX64, shared.path()).unwrap();

        let cache = table.get(CACHE_BINDING).unwrap();
        assert!(cache.host.is_some());
        assert_eq!(cache.container.as_deref(), Some("c:/mnt/cache"));
    }

    #[test]
    fn test_explicit_and_absent_sides() {
        let shared = TempDir::new().unwrap();
        let src = shared.path().join("src");
        let mut mounts = Mounts::new();
        mounts.insert("app".into(), Binding::container_only(Side::Path("srv/app".into())));
        mounts.insert("src".into(), Binding::paths(src.display().to_string(), "/work/src"));
        mounts.insert("noop".into(), Binding::none());
        let table = BindingTable::resolve(&mounts, Platform::LinuxX64, shared.path()).unwrap();

        assert_eq!(table.len(), 4);
        let app = table.get("app").unwrap();
        assert!(app.host.is_none());
        assert_eq!(app.container.as_deref(), Some("/srv/app"));

        let noop = table.get("noop").unwrap();
        assert!(noop.host.is_none() && noop.container.is_none());

        // explicit host paths are not created
        assert!(!src.exists());
        assert_eq!(table.binds().len(), 2);
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(join_normalized("/", "a/b"), "/a/b");
        assert_eq!(join_normalized("/mnt/cache", "/x.zip"), "/mnt/cache/x.zip");
        assert_eq!(join_normalized("c:/", "tools\\bin"), "c:/tools/bin");
        assert_eq!(join_normalized("/srv", "./a/../b/"), "/srv/b");
        assert_eq!(join_normalized("/", "../../etc"), "/etc");
        assert_eq!(join_normalized("/", ""), "/");
        assert_eq!(join_normalized("rel", "../.."), "..");
    }

    #[test]
    fn test_join_host_stays_inside() {
        let base = Path::new("/shared/cache");
        assert_eq!(join_host(base, "/a/b.txt"), PathBuf::from("/shared/cache/a/b.txt"));
        assert_eq!(join_host(base, "../../etc/passwd"), PathBuf::from("/shared/cache/etc/passwd"));
        assert_eq!(join_host(base, "a/../b"), PathBuf::from("/shared/cache/b"));
    }
}
