//! Version resolver: asks the release API for the latest tag and the commit
//! behind a tag, falling back to the local cache when the API is unreachable.

mod api;

pub use api::{GitRef, GitRefObject, LatestRelease};

use crate::cache::{CacheError, VersionCache};
use crate::config::ReleaseConfig;
use crate::fetch::{FetchError, HttpClient};
use crate::version::{fallback_order, CommitHash, InvalidTag, VersionTag};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no version available: release API unreachable and no version cached locally")]
    NoVersionAvailable,
    #[error("release API request failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("release API returned an unusable tag: {0}")]
    InvalidTag(#[from] InvalidTag),
    #[error("reading the local version cache failed: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: HttpClient,
    config: ReleaseConfig,
}

impl ReleaseClient {
    pub fn new(http: HttpClient, config: ReleaseConfig) -> Self {
        Self { http, config }
    }

    fn api_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Accept".to_string(),
            "application/vnd.github+json".to_string(),
        )];
        if let Some(token) = &self.config.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Tag of the latest published release, straight from the API.
    pub async fn latest_remote(&self) -> Result<VersionTag, ResolveError> {
        let release: LatestRelease = self
            .http
            .fetch_json(&self.api_url("releases/latest"), &self.api_headers())
            .await?;
        Ok(VersionTag::parse(release.tag_name)?)
    }

    /// Latest release tag; on any remote failure, the preferred locally cached tag.
    pub async fn resolve_latest(&self, cache: &VersionCache) -> Result<VersionTag, ResolveError> {
        match self.latest_remote().await {
            Ok(tag) => {
                tracing::info!("latest release is {}", tag);
                Ok(tag)
            }
            Err(remote) => {
                tracing::warn!("could not query latest release: {}", remote);
                let tag = newest_cached(cache).await?.ok_or(ResolveError::NoVersionAvailable)?;
                tracing::warn!("using locally cached version {} as fallback", tag);
                Ok(tag)
            }
        }
    }

    /// Commit the given tag points at.
    pub async fn resolve_commit(&self, tag: &VersionTag) -> Result<CommitHash, ResolveError> {
        let path = format!("git/ref/tags/{}", tag);
        let git_ref: GitRef = self
            .http
            .fetch_json(&self.api_url(&path), &self.api_headers())
            .await?;
        tracing::debug!("tag {} resolves to commit {}", tag, git_ref.object.sha);
        Ok(CommitHash::new(git_ref.object.sha))
    }

    /// Download URL of the source archive for `tag`.
    pub fn archive_url(&self, tag: &VersionTag) -> String {
        self.config.archive_url.replace("{tag}", tag.as_str())
    }

    /// Base URL under which the compiled binaries of `commit` live.
    pub fn binary_base_url(&self, commit: &CommitHash) -> String {
        self.config
            .binary_base_url
            .replace("{commit}", commit.as_str())
            .trim_end_matches('/')
            .to_string()
    }

    /// Top-level folder of the source archive: `{owner}-{repo}-{short sha}`.
    pub fn archive_prefix(&self, commit: &CommitHash) -> String {
        format!("{}-{}", self.config.repo.replace('/', "-"), commit.short())
    }
}

/// The cached version a fallback should use, if any.
pub async fn newest_cached(cache: &VersionCache) -> Result<Option<VersionTag>, CacheError> {
    let mut versions = cache.list_versions().await?;
    versions.sort_by(fallback_order);
    Ok(versions.into_iter().next().map(|v| v.tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReleaseClient {
        let cfg = ReleaseConfig {
            repo: "owner/repo".into(),
            api_base: "http://api.test/repos/owner/repo/".into(),
            archive_url: "http://archive.test/{tag}.zip".into(),
            binary_base_url: "http://bin.test/commit/{commit}/".into(),
            token: Some("t0k".into()),
        };
        ReleaseClient::new(HttpClient::default(), cfg)
    }

    #[test]
    fn url_templates() {
        let c = client();
        let tag = VersionTag::parse("v5.0.0").unwrap();
        let commit = CommitHash::new("abc1234ffff");
        assert_eq!(c.archive_url(&tag), "http://archive.test/v5.0.0.zip");
        assert_eq!(c.binary_base_url(&commit), "http://bin.test/commit/abc1234ffff");
        assert_eq!(c.archive_prefix(&commit), "owner-repo-abc1234");
        assert_eq!(
            c.api_url("releases/latest"),
            "http://api.test/repos/owner/repo/releases/latest"
        );
    }

    #[test]
    fn token_goes_into_authorization() {
        let headers = client().api_headers();
        assert!(headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer t0k"));
    }

    #[tokio::test]
    async fn newest_cached_prefers_highest_version() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = VersionCache::new(tmp.path());
        for t in ["v5.0.0-beta99", "v5.0.1", "v4.9.9"] {
            cache.ensure_clean(&VersionTag::parse(t).unwrap()).await.unwrap();
        }
        let tag = newest_cached(&cache).await.unwrap().unwrap();
        assert_eq!(tag.as_str(), "v5.0.1");
    }
}
