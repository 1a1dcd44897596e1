//! Content-addressed download cache.
//!
//! A remote file is stored once under the `cache` binding, named after the
//! SHA-256 of its URL. The file's existence is the only index: a cached file
//! is never refetched, so publishing a new version under a new URL is the
//! way to pick up changes.
//!
//! Each download streams into its own temporary file next to the target
//! (`.<file name>.<random>.part`) and is renamed into place once complete. An
//! interrupted download therefore never looks like a hit, and a failed one
//! removes only its own temporary file. Two fetches of the same missing URL
//! are not coordinated: both download and the last rename wins.

use crate::bindings::CACHE_BINDING;
use crate::error::{CoreError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Cache key of a URL: its SHA-256, base64url without padding.
pub fn cache_key(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(url.as_bytes()))
}

/// Extension of the last path segment of a URL, dot included.
///
/// Query strings and fragments are ignored. Returns an empty string when the
/// segment has no extension (dotfiles included).
pub fn url_extension(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rfind('.') {
        Some(idx) if idx > 0 => segment[idx..].to_string(),
        _ => String::new(),
    }
}

/// Cache reference (`cache:/<key><ext>`) for a URL.
///
/// `extension` overrides the one derived from the URL; pass it with its dot.
pub fn cache_reference(url: &str, extension: Option<&str>) -> String {
    let ext = match extension {
        Some(ext) => ext.to_string(),
        None => url_extension(url),
    };
    format!("{CACHE_BINDING}:/{}{ext}", cache_key(url))
}

/// Make sure the file for `url` exists at `host_path`, downloading it if needed.
pub(crate) async fn ensure_cached(
    client: &reqwest::Client,
    url: &str,
    reference: &str,
    host_path: &Path,
) -> Result<()> {
    let fail = |reason: String| CoreError::Fetch {
        url: url.to_string(),
        target: reference.to_string(),
        reason,
    };

    if tokio::fs::try_exists(host_path)
        .await
        .map_err(|e| fail(e.to_string()))?
    {
        tracing::info!(url = %url, target = %reference, "Fetch cache hit");
        return Ok(());
    }

    let start = std::time::Instant::now();
    tracing::info!(url = %url, target = %reference, "Fetching remote file");

    match download(client, url, host_path).await {
        Ok(bytes) => {
            tracing::info!(
                url = %url,
                path = %host_path.display(),
                bytes,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Remote file cached"
            );
            Ok(())
        }
        Err(reason) => {
            tracing::error!(url = %url, error = %reason, "Fetch failed");
            Err(fail(reason))
        }
    }
}

/// Stream `url` into a private temporary file, then move it to `host_path`.
///
/// The temporary file is deleted on every early return.
async fn download(
    client: &reqwest::Client,
    url: &str,
    host_path: &Path,
) -> std::result::Result<u64, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("server answered {status}"));
    }

    let dir = host_path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| e.to_string())?;
    let (file, temp_path) = part_file(dir, host_path)
        .map_err(|e| format!("cannot create temporary file in {}: {e}", dir.display()))?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| e.to_string())?;
    drop(file);

    if let Err(e) = temp_path.persist(host_path) {
        // another fetch of the same URL already put its copy in place
        if !tokio::fs::try_exists(host_path).await.unwrap_or(false) {
            return Err(format!("cannot move download into place: {}", e.error));
        }
        tracing::debug!(path = %host_path.display(), "Concurrent fetch finished first");
    }
    Ok(written)
}

/// Create `.<file name>.<random>.part` in `dir`.
fn part_file(dir: &Path, host_path: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let name = host_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".part")
        .tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable_and_url_safe() {
        let key = cache_key("https://example.com/file.txt");
        assert_eq!(key, cache_key("https://example.com/file.txt"));
        assert_eq!(key.len(), 43);
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_cache_key_distinct() {
        assert_ne!(
            cache_key("https://example.com/v1.0.zip"),
            cache_key("https://example.com/v1.1.zip")
        );
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://example.com/tool-1.2.tar.gz"), ".gz");
        assert_eq!(url_extension("https://example.com/a.zip?token=x.y"), ".zip");
        assert_eq!(url_extension("https://example.com/download"), "");
        assert_eq!(url_extension("https://example.com/.env"), "");
        assert_eq!(url_extension("https://example.com/"), "");
    }

    #[test]
    fn test_cache_reference() {
        let url = "https://example.com/7z.exe";
        assert_eq!(cache_reference(url, None), format!("cache:/{}.exe", cache_key(url)));
        assert_eq!(
            cache_reference(url, Some(".bin")),
            format!("cache:/{}.bin", cache_key(url))
        );
    }

    #[test]
    fn test_part_file_is_private_and_hidden() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("abc.zip");
        let a = part_file(dir.path(), &target).unwrap();
        let b = part_file(dir.path(), &target).unwrap();

        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".abc.zip."), "{name}");
        assert!(name.ends_with(".part"), "{name}");
        assert_eq!(a.path().parent(), Some(dir.path()));
    }
}
