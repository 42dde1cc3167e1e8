//! Per-version cache directories under a versions root.
//!
//! Layout: `<root>/<tag>/{Runtime/{*, Extensions/*}, <core binary>, <companions>}`.

use std::io;
use std::path::{Path, PathBuf};

use crate::version::{CachedVersion, InvalidTag, VersionTag};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    InvalidTag(#[from] InvalidTag),
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> CacheError {
    let path = path.to_path_buf();
    move |source| CacheError::Io {
        action,
        path,
        source,
    }
}

#[derive(Debug, Clone)]
pub struct VersionCache {
    root: PathBuf,
}

impl VersionCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, tag: &VersionTag) -> PathBuf {
        self.root.join(tag.as_str())
    }

    /// True when a directory exists for `tag`. Nothing about its contents is checked.
    pub async fn is_cached(&self, tag: &VersionTag) -> bool {
        tokio::fs::metadata(self.version_dir(tag))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Returns an empty directory for `tag`, removing whatever was there before.
    /// Calling it twice in a row yields the same empty directory.
    pub async fn ensure_clean(&self, tag: &VersionTag) -> Result<PathBuf, CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(io_err("create versions root", &self.root))?;

        let dir = self.version_dir(tag);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!("cleared stale cache directory {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err("clear", &dir)(e)),
        }
        tokio::fs::create_dir(&dir)
            .await
            .map_err(io_err("create", &dir))?;
        Ok(dir)
    }

    /// All version directories under the root. A missing root is an empty cache.
    /// Entries whose name is not a valid tag are ignored.
    pub async fn list_versions(&self) -> Result<Vec<CachedVersion>, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("list", &self.root)(e)),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_err("list", &self.root))?
        {
            let meta = match entry.metadata().await {
                Ok(m) if m.is_dir() => m,
                _ => continue,
            };
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(tag) = VersionTag::parse(name) else {
                continue;
            };
            versions.push(CachedVersion {
                tag,
                modified: meta.modified().ok(),
            });
        }
        Ok(versions)
    }

    /// Deletes the cache directory for `tag`. Returns false when it did not exist.
    pub async fn remove(&self, tag: &VersionTag) -> Result<bool, CacheError> {
        let dir = self.version_dir(tag);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!("removed cached version {}", tag);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("remove", &dir)(e)),
        }
    }

    /// Best-effort removal of a partially populated directory after a failed install.
    pub async fn discard(&self, tag: &VersionTag) {
        if let Err(e) = self.remove(tag).await {
            tracing::warn!("could not discard partial install of {}: {}", tag, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> VersionTag {
        VersionTag::parse(s).unwrap()
    }

    async fn is_empty(dir: &Path) -> bool {
        let mut rd = tokio::fs::read_dir(dir).await.unwrap();
        rd.next_entry().await.unwrap().is_none()
    }

    #[tokio::test]
    async fn ensure_clean_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache::new(tmp.path().join("Versions"));
        let t = tag("v5.0.0");

        let first = cache.ensure_clean(&t).await.unwrap();
        assert!(is_empty(&first).await);
        std::fs::write(first.join("stale.txt"), b"old").unwrap();
        std::fs::create_dir_all(first.join("Runtime/Extensions")).unwrap();

        let second = cache.ensure_clean(&t).await.unwrap();
        assert_eq!(first, second);
        assert!(is_empty(&second).await);

        let third = cache.ensure_clean(&t).await.unwrap();
        assert_eq!(second, third);
        assert!(is_empty(&third).await);
    }

    #[tokio::test]
    async fn is_cached_tracks_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache::new(tmp.path());
        let t = tag("v1");
        assert!(!cache.is_cached(&t).await);
        cache.ensure_clean(&t).await.unwrap();
        assert!(cache.is_cached(&t).await);
        assert!(cache.remove(&t).await.unwrap());
        assert!(!cache.is_cached(&t).await);
        assert!(!cache.remove(&t).await.unwrap());
    }

    #[tokio::test]
    async fn list_versions_skips_files_and_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache::new(tmp.path().join("nope"));
        assert!(cache.list_versions().await.unwrap().is_empty());

        let cache = VersionCache::new(tmp.path());
        cache.ensure_clean(&tag("v1.0.0")).await.unwrap();
        cache.ensure_clean(&tag("v2.0.0")).await.unwrap();
        std::fs::write(tmp.path().join("v3.zip"), b"").unwrap();

        let mut names: Vec<String> = cache
            .list_versions()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.tag.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["v1.0.0", "v2.0.0"]);
    }
}
