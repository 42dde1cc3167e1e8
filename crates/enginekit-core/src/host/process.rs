//! Runs the core binary as a child process.
//!
//! Stdout lines feed the output hook, stderr lines the error hook, and a
//! non-zero exit the abort hook. Readiness is a configured stdout line; without
//! one the runtime counts as ready once it has spawned.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{
    ExitNotifier, HostError, LaunchSpec, RuntimeExit, RuntimeHandle, RuntimeHooks, RuntimeHost,
};
use crate::config::HostConfig;

#[derive(Debug, Clone)]
pub struct ProcessHost {
    launcher: Vec<String>,
    ready_line: Option<String>,
    ready_timeout: Duration,
}

impl ProcessHost {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            launcher: config.launcher.clone(),
            ready_line: config.ready_line.clone(),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
        }
    }

    fn command(&self, spec: &LaunchSpec) -> (String, Command) {
        let mut argv: Vec<String> = self.launcher.clone();
        argv.push(spec.core.to_string_lossy().into_owned());
        argv.extend(spec.args.iter().cloned());

        let program = argv.remove(0);
        let mut cmd = Command::new(&program);
        cmd.args(argv)
            .current_dir(&spec.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        (program, cmd)
    }
}

/// Forwards each line of `stream` to `emit`. The first line equal to `ready_line`
/// fires `ready`; `ready` is dropped at end of stream if it never fired.
fn forward_lines<R, F>(
    stream: R,
    ready_line: Option<String>,
    mut ready: Option<oneshot::Sender<()>>,
    emit: F,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: Fn(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if ready_line.as_deref() == Some(line.trim_end()) {
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(());
                        }
                    }
                    emit(line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("runtime stream closed: {}", e);
                    break;
                }
            }
        }
    })
}

/// Owns the child until it exits or the handle asks for (or drops into) a stop.
async fn supervise(
    mut child: Child,
    mut notifier: ExitNotifier,
    hooks: RuntimeHooks,
    streams: Vec<JoinHandle<()>>,
) {
    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => RuntimeExit::from(status),
            Err(e) => RuntimeExit::Failed(e.to_string()),
        },
        _ = &mut notifier.stop_rx => {
            if let Err(e) = child.kill().await {
                tracing::warn!("could not kill runtime: {}", e);
            }
            RuntimeExit::Killed
        }
    };

    // Let the readers drain whatever the runtime printed last.
    for stream in streams {
        let _ = stream.await;
    }
    if let RuntimeExit::Failed(why) = &exit {
        hooks.on_abort(why.clone());
    }
    tracing::info!("runtime {}", exit);
    notifier.exited(exit);
}

impl RuntimeHost for ProcessHost {
    async fn launch(&self, spec: LaunchSpec, hooks: RuntimeHooks) -> Result<RuntimeHandle, HostError> {
        if !tokio::fs::try_exists(&spec.core).await.unwrap_or(false) {
            return Err(HostError::MissingCoreBinary { path: spec.core });
        }

        let (program, mut cmd) = self.command(&spec);
        let mut child = cmd.spawn().map_err(|source| HostError::Spawn {
            program: program.clone(),
            source,
        })?;
        tracing::info!(pid = ?child.id(), "launched {} for {}", program, spec.tag);

        let (ready_tx, ready_rx) = oneshot::channel();
        let ready_tx = self.ready_line.as_ref().map(|_| ready_tx);

        let mut streams = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let hooks = hooks.clone();
            streams.push(forward_lines(stdout, self.ready_line.clone(), ready_tx, move |l| {
                hooks.on_output(l)
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let hooks = hooks.clone();
            streams.push(forward_lines(stderr, None, None, move |l| hooks.on_error(l)));
        }

        let (handle, notifier) = RuntimeHandle::channel(spec.tag.clone(), spec.dir.clone(), child.id());
        let mut exit_rx = notifier.subscribe();
        tokio::spawn(supervise(child, notifier, hooks, streams));

        if self.ready_line.is_none() {
            return Ok(handle);
        }

        let waited = tokio::time::timeout(self.ready_timeout, async {
            match ready_rx.await {
                Ok(()) => Ok(()),
                // Stdout closed without the ready line: the runtime is exiting.
                Err(_) => {
                    let exit = exit_rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|e| e.clone())
                        .unwrap_or(RuntimeExit::Killed);
                    Err(HostError::ExitedBeforeReady { exit })
                }
            }
        })
        .await;

        match waited {
            Ok(Ok(())) => {
                tracing::info!("runtime {} is ready", spec.tag);
                Ok(handle)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HostError::ReadyTimeout {
                secs: self.ready_timeout.as_secs(),
            }),
        }
    }
}
