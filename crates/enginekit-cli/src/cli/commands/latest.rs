//! `enginekit latest` – print the tag `install`/`run` would pick.

use anyhow::Result;
use enginekit_core::install::Installer;

pub async fn run_latest(installer: &Installer) -> Result<()> {
    let tag = installer.resolve_latest().await?;
    println!("{tag}");
    Ok(())
}
