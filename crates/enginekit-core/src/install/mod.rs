//! Install pipeline: clean cache directory → commit lookup → in parallel
//! (archive download → extraction → build) and (binary downloads).
//!
//! Fatal: cache directory errors, commit lookup, any required download. The
//! partially populated directory is discarded so the version is not mistaken
//! for cached. Recoverable: extraction failures and build failures, which end
//! up as warnings in the [`InstallReport`].

mod report;

pub use report::{ArtifactStatus, AvailableVersion, InstallReport};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::build::{build_if_needed, needs_build, BuildOutcome, CommandBuilder, RuntimeBuilder};
use crate::cache::{CacheError, VersionCache};
use crate::config::{ArtifactNames, EngineKitConfig};
use crate::extract::{extract_subtrees, Subtree};
use crate::fetch::{FetchError, FetchOutcome, FetchPolicy, FetchRequest, HttpClient};
use crate::loader::LoadState;
use crate::release::{ReleaseClient, ResolveError};
use crate::version::{CommitHash, VersionTag};

/// Archive folder (below the archive prefix) holding the extensions.
pub const EXTENSIONS_SOURCE: &str = "Extensions";
/// Archive folder (below the archive prefix) holding the runtime.
pub const RUNTIME_SOURCE: &str = "GDJS/Runtime";

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("required artifact unavailable: {0}")]
    Fetch(#[from] FetchError),
    #[error("preparing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type StateObserver = Arc<dyn Fn(LoadState) + Send + Sync>;

pub struct Installer<B = CommandBuilder> {
    cache: VersionCache,
    releases: ReleaseClient,
    http: HttpClient,
    artifacts: ArtifactNames,
    builder: B,
    observer: Option<StateObserver>,
}

impl<B> std::fmt::Debug for Installer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("cache", &self.cache)
            .field("releases", &self.releases)
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

impl Installer<CommandBuilder> {
    /// Installer wired from the config file sections.
    pub fn from_config(cfg: &EngineKitConfig) -> anyhow::Result<Self> {
        let http = HttpClient::from_config(cfg);
        Ok(Self::new(
            VersionCache::new(cfg.versions_root()?),
            ReleaseClient::new(http.clone(), cfg.release.clone()),
            http,
            cfg.artifacts.clone(),
            CommandBuilder::new(cfg.build.clone()),
        ))
    }
}

impl<B: RuntimeBuilder + Sync> Installer<B> {
    pub fn new(
        cache: VersionCache,
        releases: ReleaseClient,
        http: HttpClient,
        artifacts: ArtifactNames,
        builder: B,
    ) -> Self {
        Self {
            cache,
            releases,
            http,
            artifacts,
            builder,
            observer: None,
        }
    }

    /// Called on every pipeline state transition.
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cache(&self) -> &VersionCache {
        &self.cache
    }

    pub fn artifacts(&self) -> &ArtifactNames {
        &self.artifacts
    }

    pub(crate) fn transition(&self, state: LoadState) {
        tracing::debug!(?state, "pipeline state");
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    /// Latest release tag, falling back to the newest cached one.
    pub async fn resolve_latest(&self) -> Result<VersionTag, ResolveError> {
        self.releases.resolve_latest(&self.cache).await
    }

    /// Makes sure `tag` (or the latest version) is in the cache, installing it if needed.
    pub async fn ensure_available(
        &self,
        tag: Option<VersionTag>,
    ) -> Result<AvailableVersion, InstallError> {
        let tag = match tag {
            Some(tag) => tag,
            None => self.resolve_latest().await?,
        };
        if self.cache.is_cached(&tag).await {
            tracing::info!("version {} already cached", tag);
            return Ok(AvailableVersion {
                dir: self.cache.version_dir(&tag),
                tag,
                installed: None,
            });
        }
        let report = self.install(&tag).await?;
        Ok(AvailableVersion {
            tag,
            dir: report.dir.clone(),
            installed: Some(report),
        })
    }

    /// Downloads `tag` into a fresh cache directory, replacing any previous contents.
    pub async fn install(&self, tag: &VersionTag) -> Result<InstallReport, InstallError> {
        tracing::info!("installing version {}", tag);
        self.transition(LoadState::NotCached);
        let dir = self.cache.ensure_clean(tag).await?;
        match self.populate(tag, &dir).await {
            Ok(report) => {
                self.transition(LoadState::ArtifactsReady);
                tracing::info!(
                    "installed {} into {} ({} warnings)",
                    tag,
                    dir.display(),
                    report.warnings.len()
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("installing {} failed: {}", tag, e);
                self.cache.discard(tag).await;
                Err(e)
            }
        }
    }

    async fn populate(&self, tag: &VersionTag, dir: &Path) -> Result<InstallReport, InstallError> {
        let runtime = dir.join("Runtime");
        let extensions = runtime.join("Extensions");
        tokio::fs::create_dir_all(&extensions)
            .await
            .map_err(|source| InstallError::Io {
                path: extensions.clone(),
                source,
            })?;

        let commit = self.releases.resolve_commit(tag).await?;
        self.transition(LoadState::Downloading);

        let (sources, artifacts) = tokio::join!(
            self.install_sources(tag, &commit, dir, &runtime, &extensions),
            self.download_binaries(&commit, dir),
        );
        let sources = sources?;
        let binaries = artifacts?;

        let mut warnings = sources.warnings;
        warnings.extend(binaries.warnings);
        Ok(InstallReport {
            tag: tag.clone(),
            dir: dir.to_path_buf(),
            commit,
            files_extracted: sources.files_extracted,
            build: sources.build,
            artifacts: binaries.artifacts,
            warnings,
        })
    }

    /// Archive chain. Only the archive download itself is fatal.
    async fn install_sources(
        &self,
        tag: &VersionTag,
        commit: &CommitHash,
        dir: &Path,
        runtime: &Path,
        extensions: &Path,
    ) -> Result<SourcesStatus, InstallError> {
        let archive = dir.join(format!("{}.zip", tag));
        self.http
            .fetch(&FetchRequest::required(self.releases.archive_url(tag), &archive))
            .await?;

        self.transition(LoadState::Extracting);
        let mut status = SourcesStatus::default();
        let subtrees = [
            Subtree::new(EXTENSIONS_SOURCE, extensions),
            Subtree::new(RUNTIME_SOURCE, runtime),
        ];
        match extract_subtrees(&archive, &self.releases.archive_prefix(commit), &subtrees).await {
            Ok(report) => {
                status.files_extracted = report.files_extracted();
                for (source, e) in report.failures() {
                    status.warnings.push(format!("extracting {}: {}", source, e));
                }
            }
            Err(e) => {
                tracing::error!("could not extract archive: {}", e);
                status.warnings.push(format!("extracting archive: {}", e));
            }
        }

        if needs_build(runtime, &self.builder).await.unwrap_or(false) {
            self.transition(LoadState::Building);
        }
        match build_if_needed(runtime, &self.builder).await {
            Ok(outcome) => status.build = Some(outcome),
            Err(e) => {
                tracing::warn!("runtime build failed, continuing with uncompiled sources: {}", e);
                status.warnings.push(format!("building runtime: {}", e));
            }
        }
        Ok(status)
    }

    /// Core binary (required) plus the two optional companions, fetched concurrently.
    /// Any failure of an optional companion is only a warning.
    async fn download_binaries(
        &self,
        commit: &CommitHash,
        dir: &Path,
    ) -> Result<BinariesStatus, InstallError> {
        let base = self.releases.binary_base_url(commit);
        let url = |name: &str| format!("{}/{}", base, name);
        let names = &self.artifacts;
        let requests = [
            FetchRequest::required(url(&names.core), dir.join(&names.core)),
            FetchRequest::optional(url(&names.memory_image), dir.join(&names.memory_image)),
            FetchRequest::optional(url(&names.portable), dir.join(&names.portable)),
        ];

        let (core, memory, portable) = tokio::join!(
            self.http.fetch(&requests[0]),
            self.http.fetch(&requests[1]),
            self.http.fetch(&requests[2]),
        );

        let mut status = BinariesStatus::default();
        for (request, result) in requests.iter().zip([core, memory, portable]) {
            let name = request
                .dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match (result, request.policy) {
                (Ok(outcome), policy) => {
                    if let (FetchOutcome::Written { path, .. }, FetchPolicy::Required) = (&outcome, policy) {
                        make_executable(path).await?;
                    }
                    status.artifacts.push(ArtifactStatus { name, outcome });
                }
                (Err(e), FetchPolicy::Required) => return Err(e.into()),
                (Err(e), FetchPolicy::Optional) => {
                    tracing::warn!("optional artifact {} failed: {}", name, e);
                    status.warnings.push(format!("downloading {}: {}", name, e));
                }
            }
        }
        Ok(status)
    }
}

/// The core binary is launched directly when no launcher is configured.
#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|source| InstallError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

#[derive(Debug, Default)]
struct BinariesStatus {
    artifacts: Vec<ArtifactStatus>,
    warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct SourcesStatus {
    files_extracted: usize,
    build: Option<BuildOutcome>,
    warnings: Vec<String>,
}
