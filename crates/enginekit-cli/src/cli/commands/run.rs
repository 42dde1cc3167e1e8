//! `enginekit run [TAG] [-- ARGS]` – load a version and relay its diagnostics.

use anyhow::{bail, Result};
use enginekit_core::config::EngineKitConfig;
use enginekit_core::host::RuntimeExit;
use enginekit_core::listeners::DiagnosticKind;
use enginekit_core::loader::Loader;
use enginekit_core::version::VersionTag;

pub async fn run_runtime(cfg: &EngineKitConfig, tag: Option<VersionTag>, args: Vec<String>) -> Result<()> {
    let loader = Loader::from_config(cfg)?.with_args(args);
    loader
        .listeners()
        .subscribe(DiagnosticKind::Output, |d| println!("{}", d.message()));
    loader
        .listeners()
        .subscribe(DiagnosticKind::Error, |d| eprintln!("{}", d.message()));

    let mut handle = loader.load(tag).await?;
    eprintln!("{} running from {}", handle.tag(), handle.dir().display());

    let exit = tokio::select! {
        exit = handle.wait() => exit,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping runtime");
            handle.shutdown().await
        }
    };
    match exit {
        RuntimeExit::Failed(why) => bail!("runtime failed: {}", why),
        other => {
            eprintln!("runtime {other}");
            Ok(())
        }
    }
}
