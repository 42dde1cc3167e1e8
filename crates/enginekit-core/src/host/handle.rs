//! Owned handle to a loaded runtime.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::sync::{oneshot, watch};

use crate::version::VersionTag;

/// How a runtime ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeExit {
    Clean,
    Failed(String),
    /// Stopped through [`RuntimeHandle::shutdown`] or by dropping the handle.
    Killed,
}

impl From<ExitStatus> for RuntimeExit {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            RuntimeExit::Clean
        } else {
            RuntimeExit::Failed(status.to_string())
        }
    }
}

impl fmt::Display for RuntimeExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeExit::Clean => f.write_str("exited cleanly"),
            RuntimeExit::Failed(why) => write!(f, "failed: {}", why),
            RuntimeExit::Killed => f.write_str("killed"),
        }
    }
}

/// Host side of a handle: reports the exit and listens for a stop request.
#[derive(Debug)]
pub struct ExitNotifier {
    exit_tx: watch::Sender<Option<RuntimeExit>>,
    /// Resolves when the handle asks for a stop, or errors when the handle is dropped.
    pub stop_rx: oneshot::Receiver<()>,
}

impl ExitNotifier {
    pub fn exited(&self, exit: RuntimeExit) {
        let _ = self.exit_tx.send(Some(exit));
    }

    /// Watches the exit slot (used by hosts to notice an exit before readiness).
    pub fn subscribe(&self) -> watch::Receiver<Option<RuntimeExit>> {
        self.exit_tx.subscribe()
    }
}

/// A loaded runtime. The caller that invoked the load owns it; dropping it stops the runtime.
#[derive(Debug)]
pub struct RuntimeHandle {
    tag: VersionTag,
    dir: PathBuf,
    pid: Option<u32>,
    exit_rx: watch::Receiver<Option<RuntimeExit>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl RuntimeHandle {
    /// A handle plus the notifier its host uses to report back.
    pub fn channel(tag: VersionTag, dir: PathBuf, pid: Option<u32>) -> (Self, ExitNotifier) {
        let (exit_tx, exit_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = Self {
            tag,
            dir,
            pid,
            exit_rx,
            stop_tx: Some(stop_tx),
        };
        (handle, ExitNotifier { exit_tx, stop_rx })
    }

    pub fn tag(&self) -> &VersionTag {
        &self.tag
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit state if the runtime already ended.
    pub fn try_exit(&self) -> Option<RuntimeExit> {
        self.exit_rx.borrow().clone()
    }

    /// Waits for the runtime to end on its own.
    pub async fn wait(&mut self) -> RuntimeExit {
        match self.exit_rx.wait_for(Option::is_some).await {
            Ok(exit) => exit.clone().unwrap_or(RuntimeExit::Killed),
            // Host went away without reporting.
            Err(_) => RuntimeExit::Killed,
        }
    }

    /// Asks the host to stop the runtime and waits until it has.
    pub async fn shutdown(mut self) -> RuntimeExit {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        self.wait().await
    }
}
