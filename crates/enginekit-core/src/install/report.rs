//! What an install did, including the non-fatal problems it tolerated.

use std::path::PathBuf;

use crate::build::BuildOutcome;
use crate::fetch::FetchOutcome;
use crate::version::{CommitHash, VersionTag};

#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    /// File name inside the version directory.
    pub name: String,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub tag: VersionTag,
    /// `<versions root>/<tag>`, the directory that now holds the install.
    pub dir: PathBuf,
    /// Commit the tag resolved to; names the archive prefix and binary URLs.
    pub commit: CommitHash,
    /// Files written across both extracted subtrees.
    pub files_extracted: usize,
    /// `None` when the build step did not run to a verdict (it failed, see `warnings`).
    pub build: Option<BuildOutcome>,
    /// One entry per binary that was written or skipped, core first.
    pub artifacts: Vec<ArtifactStatus>,
    /// Recoverable problems: partial extraction, failed build.
    pub warnings: Vec<String>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Optional artifacts the server did not have.
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.outcome, FetchOutcome::Skipped { .. }))
            .map(|a| a.name.as_str())
    }
}

/// A version that is present in the cache and ready to load.
#[derive(Debug, Clone)]
pub struct AvailableVersion {
    pub tag: VersionTag,
    pub dir: PathBuf,
    /// Set when the version had to be downloaded.
    pub installed: Option<InstallReport>,
}
