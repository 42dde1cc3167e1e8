//! Archive extractor: pulls selected subtrees out of a release archive.
//!
//! The archive is indexed once; each subtree is then extracted on its own
//! blocking task against a clone of that index. A failing subtree is reported
//! in the [`ExtractReport`] without stopping its siblings, and the archive file
//! is deleted afterwards whatever happened.

mod entry;
mod guard;
mod reader;

use std::io;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use guard::RemoveOnDrop;
use reader::ArchiveReader;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("opening archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("indexing archive {}: {source}", path.display())]
    Index {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("archive entry {name}: {source}")]
    Entry {
        name: String,
        #[source]
        source: ZipError,
    },
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive has no entries under {prefix}")]
    MissingSubtree { prefix: String },
    #[error("extraction task did not complete: {0}")]
    Aborted(String),
}

/// One archive folder (relative to the archive prefix) and where its contents go.
#[derive(Debug, Clone)]
pub struct Subtree {
    pub source: String,
    pub dest: PathBuf,
}

impl Subtree {
    pub fn new(source: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

#[derive(Debug)]
pub struct SubtreeResult {
    pub source: String,
    /// Number of files written, or why this subtree failed.
    pub result: Result<usize, ExtractError>,
}

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub subtrees: Vec<SubtreeResult>,
}

impl ExtractReport {
    pub fn is_complete(&self) -> bool {
        self.subtrees.iter().all(|s| s.result.is_ok())
    }

    pub fn files_extracted(&self) -> usize {
        self.subtrees
            .iter()
            .filter_map(|s| s.result.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ExtractError)> {
        self.subtrees
            .iter()
            .filter_map(|s| s.result.as_ref().err().map(|e| (s.source.as_str(), e)))
    }
}

fn index_archive(path: &Path) -> Result<ZipArchive<ArchiveReader>, ExtractError> {
    let reader = ArchiveReader::open(path).map_err(|source| ExtractError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    ZipArchive::new(reader).map_err(|source| ExtractError::Index {
        path: path.to_path_buf(),
        source,
    })
}

/// Extracts every subtree of `subtrees` concurrently, then deletes `archive_path`.
///
/// `archive_prefix` is the archive's top-level folder (e.g. `owner-repo-abc1234`).
/// Destination directories are expected to exist already. Only a failure to open
/// or index the archive is returned as `Err`; per-subtree failures are in the report.
pub async fn extract_subtrees(
    archive_path: &Path,
    archive_prefix: &str,
    subtrees: &[Subtree],
) -> Result<ExtractReport, ExtractError> {
    let _cleanup = RemoveOnDrop(archive_path.to_path_buf());

    let archive = tokio::task::spawn_blocking({
        let path = archive_path.to_path_buf();
        move || index_archive(&path)
    })
    .await
    .map_err(|e| ExtractError::Aborted(e.to_string()))??;
    tracing::debug!(
        "indexed {} ({} entries)",
        archive_path.display(),
        archive.len()
    );

    let handles: Vec<_> = subtrees
        .iter()
        .cloned()
        .map(|subtree| {
            let mut archive = archive.clone();
            let prefix = archive_prefix.to_string();
            let source = subtree.source.clone();
            let handle = tokio::task::spawn_blocking(move || {
                entry::extract_subtree(&mut archive, &prefix, &subtree)
            });
            (source, handle)
        })
        .collect();

    let mut report = ExtractReport::default();
    for (source, handle) in handles {
        let result = handle
            .await
            .unwrap_or_else(|e| Err(ExtractError::Aborted(e.to_string())));
        match &result {
            Ok(files) => tracing::info!("extracted {} ({} files)", source, files),
            Err(e) => tracing::error!("extracting {} failed: {}", source, e),
        }
        report.subtrees.push(SubtreeResult { source, result });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let opts = SimpleFileOptions::default();
        for (name, body) in entries {
            match body {
                Some(data) => {
                    zip.start_file(*name, opts).unwrap();
                    zip.write_all(data).unwrap();
                }
                None => zip.add_directory(*name, opts).unwrap(),
            }
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_runtime_and_extensions_then_removes_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("v5.0.0.zip");
        write_zip(
            &archive,
            &[
                ("owner-repo-abc1234/", None),
                ("owner-repo-abc1234/Extensions/", None),
                ("owner-repo-abc1234/Extensions/foo.json", Some(b"{}")),
                ("owner-repo-abc1234/Extensions/Physics/physics.js", Some(b"p")),
                ("owner-repo-abc1234/GDJS/Runtime/bar.js", Some(b"bar")),
                ("owner-repo-abc1234/README.md", Some(b"readme")),
            ],
        );
        let runtime = tmp.path().join("Runtime");
        let extensions = runtime.join("Extensions");
        std::fs::create_dir_all(&extensions).unwrap();

        let report = extract_subtrees(
            &archive,
            "owner-repo-abc1234",
            &[
                Subtree::new("Extensions", &extensions),
                Subtree::new("GDJS/Runtime", &runtime),
            ],
        )
        .await
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.files_extracted(), 3);
        assert_eq!(std::fs::read(extensions.join("foo.json")).unwrap(), b"{}");
        assert!(extensions.join("Physics/physics.js").exists());
        assert_eq!(std::fs::read(runtime.join("bar.js")).unwrap(), b"bar");
        assert!(!tmp.path().join("README.md").exists());
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn missing_subtree_does_not_stop_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("p-q-1234567/GDJS/Runtime/game.js", Some(b"g"))]);
        let runtime = tmp.path().join("Runtime");
        std::fs::create_dir_all(runtime.join("Extensions")).unwrap();

        let report = extract_subtrees(
            &archive,
            "p-q-1234567",
            &[
                Subtree::new("Extensions", runtime.join("Extensions")),
                Subtree::new("GDJS/Runtime", &runtime),
            ],
        )
        .await
        .unwrap();

        assert!(!report.is_complete());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "Extensions");
        assert!(matches!(failures[0].1, ExtractError::MissingSubtree { .. }));
        assert!(runtime.join("game.js").exists());
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn corrupt_archive_errors_and_is_still_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_subtrees(&archive, "x", &[Subtree::new("Extensions", tmp.path())])
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Index { .. }));
        assert!(!archive.exists());
    }
}
