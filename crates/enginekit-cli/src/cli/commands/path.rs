//! `enginekit path [TAG]` – print where a version lives (or would live) in the cache.

use anyhow::Result;
use enginekit_core::install::Installer;
use enginekit_core::version::VersionTag;

pub async fn run_path(installer: &Installer, tag: Option<VersionTag>) -> Result<()> {
    let tag = match tag {
        Some(tag) => tag,
        None => installer.resolve_latest().await?,
    };
    let cache = installer.cache();
    if !cache.is_cached(&tag).await {
        eprintln!("note: {tag} is not cached yet");
    }
    println!("{}", cache.version_dir(&tag).display());
    Ok(())
}
