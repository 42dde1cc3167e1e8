//! RAII guard that deletes the downloaded archive when dropped.

use std::path::PathBuf;

pub(super) struct RemoveOnDrop(pub(super) PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!("removed archive {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("could not remove archive {}: {}", self.0.display(), e),
        }
    }
}
