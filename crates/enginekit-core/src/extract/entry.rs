//! Extraction of one subtree out of an indexed archive.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use super::{ExtractError, Subtree};

/// Archive-relative path under `prefix` turned into a safe relative filesystem path.
/// Returns `None` for the prefix directory itself and for anything that would
/// escape the destination (`..`, absolute paths, drive prefixes).
pub(super) fn relative_under(name: &str, prefix: &str) -> Option<PathBuf> {
    let rest = name.strip_prefix(prefix)?.trim_end_matches('/');
    if rest.is_empty() {
        return None;
    }
    let mut out = PathBuf::new();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// `{archive prefix}/{subtree source}/`, the folder whose contents land in `dest`.
pub(super) fn subtree_prefix(archive_prefix: &str, source: &str) -> String {
    let archive_prefix = archive_prefix.trim_matches('/');
    let source = source.trim_matches('/');
    match (archive_prefix.is_empty(), source.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!("{}/", source),
        (false, true) => format!("{}/", archive_prefix),
        (false, false) => format!("{}/{}/", archive_prefix, source),
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ExtractError {
    let path = path.to_path_buf();
    move |source| ExtractError::Io { path, source }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Copies every entry under `archive_prefix/subtree.source/` into `subtree.dest`.
/// Returns the number of files written.
pub(super) fn extract_subtree<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    archive_prefix: &str,
    subtree: &Subtree,
) -> Result<usize, ExtractError> {
    let prefix = subtree_prefix(archive_prefix, &subtree.source);
    let names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(&prefix))
        .map(str::to_owned)
        .collect();
    if names.is_empty() {
        return Err(ExtractError::MissingSubtree { prefix });
    }

    let mut files = 0usize;
    for name in names {
        let Some(rel) = relative_under(&name, &prefix) else {
            if name.trim_end_matches('/') != prefix.trim_end_matches('/') {
                tracing::warn!("skipping unsafe archive entry {}", name);
            }
            continue;
        };
        let Some(index) = archive.index_for_name(&name) else {
            continue;
        };
        let mut entry = archive.by_index(index).map_err(|source| ExtractError::Entry {
            name: name.clone(),
            source,
        })?;
        let target = subtree.dest.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_err(&target))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut out = File::create(&target).map_err(io_err(&target))?;
        io::copy(&mut entry, &mut out).map_err(io_err(&target))?;
        apply_mode(&target, entry.unix_mode()).map_err(io_err(&target))?;
        files += 1;
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_under_strips_prefix() {
        let p = "owner-repo-abc1234/GDJS/Runtime/";
        assert_eq!(
            relative_under("owner-repo-abc1234/GDJS/Runtime/bar.js", p),
            Some(PathBuf::from("bar.js"))
        );
        assert_eq!(
            relative_under("owner-repo-abc1234/GDJS/Runtime/sub/dir/", p),
            Some(PathBuf::from("sub/dir"))
        );
        assert_eq!(relative_under("owner-repo-abc1234/GDJS/Runtime/", p), None);
        assert_eq!(relative_under("owner-repo-abc1234/Extensions/x.js", p), None);
    }

    #[test]
    fn relative_under_rejects_escapes() {
        let p = "root/Extensions/";
        assert_eq!(relative_under("root/Extensions/../../etc/passwd", p), None);
        assert_eq!(relative_under("root/Extensions//abs", p), None);
        assert_eq!(relative_under("root/Extensions/./a.js", p), Some(PathBuf::from("a.js")));
    }

    #[test]
    fn subtree_prefix_joins() {
        assert_eq!(subtree_prefix("owner-repo-abc1234/", "Extensions"), "owner-repo-abc1234/Extensions/");
        assert_eq!(subtree_prefix("owner-repo-abc1234", "/GDJS/Runtime/"), "owner-repo-abc1234/GDJS/Runtime/");
        assert_eq!(subtree_prefix("", "Extensions"), "Extensions/");
    }
}
