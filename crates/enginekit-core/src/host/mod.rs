//! Hosts that bring a downloaded core binary to life.
//!
//! A [`RuntimeHost`] launches the core binary with three hooks (output lines,
//! error lines, abnormal termination) and resolves once the runtime reports
//! that it finished initializing. [`ProcessHost`] runs it as a child process.

mod handle;
mod process;

pub use handle::{ExitNotifier, RuntimeExit, RuntimeHandle};
pub use process::ProcessHost;

use std::future::Future;
use std::io;
use std::path::PathBuf;

use crate::listeners::{Diagnostic, Listeners};
use crate::version::VersionTag;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("core binary {} is missing", path.display())]
    MissingCoreBinary { path: PathBuf },
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("runtime exited before signalling readiness ({exit})")]
    ExitedBeforeReady { exit: RuntimeExit },
    #[error("runtime did not signal readiness within {secs}s")]
    ReadyTimeout { secs: u64 },
}

/// What to launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub tag: VersionTag,
    /// Cache directory of the version; used as working directory.
    pub dir: PathBuf,
    pub core: PathBuf,
    /// Extra arguments passed after the core binary.
    pub args: Vec<String>,
}

/// The three callbacks injected into a running core binary. Each forwards to
/// every listener currently registered in the matching set.
#[derive(Debug, Clone)]
pub struct RuntimeHooks {
    listeners: Listeners,
}

impl RuntimeHooks {
    pub fn new(listeners: Listeners) -> Self {
        Self { listeners }
    }

    pub fn on_output(&self, line: impl Into<String>) {
        self.listeners.emit(&Diagnostic::Output(line.into()));
    }

    pub fn on_error(&self, line: impl Into<String>) {
        self.listeners.emit(&Diagnostic::Error(line.into()));
    }

    pub fn on_abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("runtime aborted: {}", reason);
        self.listeners.emit(&Diagnostic::Abort(reason));
    }
}

pub trait RuntimeHost {
    /// Launches `spec` and resolves once the runtime is ready.
    fn launch(
        &self,
        spec: LaunchSpec,
        hooks: RuntimeHooks,
    ) -> impl Future<Output = Result<RuntimeHandle, HostError>> + Send;
}
