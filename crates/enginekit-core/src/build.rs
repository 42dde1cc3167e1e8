//! Post-extraction builder: compiles the extracted runtime sources when they
//! have not been compiled yet.
//!
//! Whether a build is needed is decided by a marker source file inside the
//! runtime tree. The build itself is delegated to a [`RuntimeBuilder`]; the
//! default one runs an external command and then prunes the TypeScript sources,
//! which also removes the marker so a second pass is a no-op.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::config::BuildConfig;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build command is empty")]
    EmptyCommand,
    #[error("could not start build command {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("build command exited with {status}")]
    Failed { status: ExitStatus },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Marker absent: the runtime is already compiled.
    Skipped,
    Built,
}

/// Compiles a runtime tree in place.
pub trait RuntimeBuilder {
    /// Source file (relative to the runtime dir) that only exists before compilation.
    fn marker(&self) -> &str;

    fn build(&self, runtime_dir: &Path) -> impl Future<Output = Result<(), BuildError>> + Send;
}

/// True while the builder's marker file is still in `runtime_dir`.
pub async fn needs_build<B: RuntimeBuilder>(runtime_dir: &Path, builder: &B) -> Result<bool, BuildError> {
    let marker_path = runtime_dir.join(builder.marker());
    tokio::fs::try_exists(&marker_path)
        .await
        .map_err(|source| BuildError::Io {
            path: marker_path,
            source,
        })
}

/// Runs `runtime_dir`'s build through `builder` if its marker is still present.
pub async fn build_if_needed<B: RuntimeBuilder>(
    runtime_dir: &Path,
    builder: &B,
) -> Result<BuildOutcome, BuildError> {
    let marker = builder.marker();
    if !needs_build(runtime_dir, builder).await? {
        tracing::info!(
            "{} not found in {}, runtime already compiled; skipping build",
            marker,
            runtime_dir.display()
        );
        return Ok(BuildOutcome::Skipped);
    }

    tracing::info!("compiling runtime sources in {}", runtime_dir.display());
    builder.build(runtime_dir).await?;
    tracing::info!("runtime compiled");
    Ok(BuildOutcome::Built)
}

/// External command builder configured by the `[build]` section.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    config: BuildConfig,
}

impl CommandBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }
}

impl RuntimeBuilder for CommandBuilder {
    fn marker(&self) -> &str {
        &self.config.marker
    }

    async fn build(&self, runtime_dir: &Path) -> Result<(), BuildError> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or(BuildError::EmptyCommand)?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(runtime_dir)
            .env("ENGINEKIT_RUNTIME_DIR", runtime_dir)
            .kill_on_drop(true);

        if self.config.append_sources {
            let dir = runtime_dir.to_path_buf();
            let sources = tokio::task::spawn_blocking(move || typescript_sources(&dir))
                .await
                .map_err(|e| BuildError::Io {
                    path: runtime_dir.to_path_buf(),
                    source: io::Error::other(e),
                })??;
            tracing::debug!("passing {} sources to {}", sources.len(), program);
            cmd.args(sources);
        }

        let status = cmd.status().await.map_err(|source| BuildError::Spawn {
            program: program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(BuildError::Failed { status });
        }

        let dir = runtime_dir.to_path_buf();
        let removed = tokio::task::spawn_blocking(move || prune_typescript_sources(&dir))
            .await
            .map_err(|e| BuildError::Io {
                path: runtime_dir.to_path_buf(),
                source: io::Error::other(e),
            })??;
        tracing::debug!("pruned {} compiled sources", removed);
        Ok(())
    }
}

fn is_typescript_source(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".ts") && !name.ends_with(".d.ts")
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), BuildError> {
    let io_err = |source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if entry.file_type().map_err(io_err)?.is_dir() {
            walk(&path, out)?;
        } else if is_typescript_source(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// TypeScript sources under `dir`, relative to it, in a stable order.
fn typescript_sources(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    let mut rel: Vec<PathBuf> = found
        .into_iter()
        .filter_map(|p| p.strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();
    rel.sort();
    Ok(rel)
}

fn prune_typescript_sources(dir: &Path) -> Result<usize, BuildError> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    for path in &found {
        std::fs::remove_file(path).map_err(|source| BuildError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(found.len())
}
