//! `enginekit list` – show cached versions in fallback preference order.

use anyhow::Result;
use enginekit_core::cache::VersionCache;
use enginekit_core::version::fallback_order;
use std::time::SystemTime;

pub async fn run_list(cache: &VersionCache) -> Result<()> {
    let mut versions = cache.list_versions().await?;
    if versions.is_empty() {
        println!("No versions cached in {}.", cache.root().display());
        return Ok(());
    }
    versions.sort_by(fallback_order);
    println!("{:<20} {}", "TAG", "AGE");
    for v in versions {
        let age = v
            .modified
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .map(|d| format!("{}h", d.as_secs() / 3600))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {}", v.tag, age);
    }
    Ok(())
}
