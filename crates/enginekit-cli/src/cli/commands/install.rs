//! `enginekit install [TAG] [--force]` – bring a version into the cache.

use anyhow::Result;
use enginekit_core::fetch::FetchOutcome;
use enginekit_core::install::{InstallReport, Installer};
use enginekit_core::version::VersionTag;

pub async fn run_install(installer: &Installer, tag: Option<VersionTag>, force: bool) -> Result<()> {
    if !force {
        let available = installer.ensure_available(tag).await?;
        match available.installed {
            Some(report) => print_report(&report),
            None => println!("{} already cached at {}", available.tag, available.dir.display()),
        }
        return Ok(());
    }

    let tag = match tag {
        Some(tag) => tag,
        None => installer.resolve_latest().await?,
    };
    let report = installer.install(&tag).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &InstallReport) {
    println!("Installed {} (commit {}) into {}", report.tag, report.commit.short(), report.dir.display());
    println!("  extracted files: {}", report.files_extracted);
    for artifact in &report.artifacts {
        match &artifact.outcome {
            FetchOutcome::Written { bytes, .. } => println!("  {:<16} {} bytes", artifact.name, bytes),
            FetchOutcome::Skipped { code } => println!("  {:<16} not published (HTTP {})", artifact.name, code),
        }
    }
    if let Some(build) = report.build {
        println!("  runtime build: {:?}", build);
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
}
