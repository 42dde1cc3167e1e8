//! `enginekit remove <tag>` – delete a cached version.

use anyhow::Result;
use enginekit_core::cache::VersionCache;
use enginekit_core::version::VersionTag;

pub async fn run_remove(cache: &VersionCache, tag: &VersionTag) -> Result<()> {
    if cache.remove(tag).await? {
        println!("Removed {tag}");
    } else {
        println!("{tag} is not cached");
    }
    Ok(())
}
