//! Runtime loader: brings a version into the cache if needed, then hands the
//! core binary to a [`RuntimeHost`] and returns the owned [`RuntimeHandle`].

use crate::build::{CommandBuilder, RuntimeBuilder};
use crate::config::EngineKitConfig;
use crate::host::{HostError, LaunchSpec, ProcessHost, RuntimeHandle, RuntimeHooks, RuntimeHost};
use crate::install::{InstallError, Installer};
use crate::listeners::Listeners;
use crate::version::VersionTag;

/// Where a load currently is. A cached version starts at `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotCached,
    Downloading,
    Extracting,
    Building,
    ArtifactsReady,
    Loading,
    Ready,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug)]
pub struct Loader<H, B = CommandBuilder> {
    installer: Installer<B>,
    host: H,
    listeners: Listeners,
    args: Vec<String>,
}

impl Loader<ProcessHost> {
    pub fn from_config(cfg: &EngineKitConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Installer::from_config(cfg)?, ProcessHost::new(&cfg.host)))
    }
}

impl<H: RuntimeHost, B: RuntimeBuilder + Sync> Loader<H, B> {
    pub fn new(installer: Installer<B>, host: H) -> Self {
        Self {
            installer,
            host,
            listeners: Listeners::new(),
            args: Vec::new(),
        }
    }

    /// Extra arguments handed to the core binary.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Listener sets the runtime's hooks forward to. Listeners may be added
    /// before or after `load`.
    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn installer(&self) -> &Installer<B> {
        &self.installer
    }

    /// Installs `tag` (or the latest version) if it is not cached, then launches it.
    pub async fn load(&self, tag: Option<VersionTag>) -> Result<RuntimeHandle, LoadError> {
        let available = self.installer.ensure_available(tag).await?;
        tracing::info!("loading {} from {}", available.tag, available.dir.display());
        self.installer.transition(LoadState::Loading);

        let spec = LaunchSpec {
            core: available.dir.join(&self.installer.artifacts().core),
            tag: available.tag,
            dir: available.dir,
            args: self.args.clone(),
        };
        let handle = self
            .host
            .launch(spec, RuntimeHooks::new(self.listeners.clone()))
            .await?;

        self.installer.transition(LoadState::Ready);
        tracing::info!("runtime {} ready (pid {:?})", handle.tag(), handle.pid());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::VersionCache;
    use crate::config::{ArtifactNames, BuildConfig, ReleaseConfig};
    use crate::fetch::{HttpClient, TransferOptions};
    use crate::host::RuntimeExit;
    use crate::listeners::DiagnosticKind;
    use crate::release::ReleaseClient;
    use crate::retry::RetryPolicy;
    use std::sync::{Arc, Mutex};

    /// In-process host: prints a banner through the hooks and stays up until stopped.
    struct FakeHost;

    impl RuntimeHost for FakeHost {
        async fn launch(&self, spec: LaunchSpec, hooks: RuntimeHooks) -> Result<RuntimeHandle, HostError> {
            if !spec.core.is_file() {
                return Err(HostError::MissingCoreBinary { path: spec.core });
            }
            hooks.on_output("booting");
            hooks.on_error("no audio device");
            let (handle, mut notifier) = RuntimeHandle::channel(spec.tag, spec.dir, None);
            tokio::spawn(async move {
                let _ = (&mut notifier.stop_rx).await;
                notifier.exited(RuntimeExit::Killed);
            });
            Ok(handle)
        }
    }

    fn installer(root: &std::path::Path) -> Installer {
        let http = HttpClient::new(TransferOptions::default(), RetryPolicy::none());
        let release = ReleaseConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            ..ReleaseConfig::default()
        };
        Installer::new(
            VersionCache::new(root),
            ReleaseClient::new(http.clone(), release),
            http,
            ArtifactNames::default(),
            CommandBuilder::new(BuildConfig::default()),
        )
    }

    #[tokio::test]
    async fn cached_version_loads_and_forwards_to_listeners_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("v5.0.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("libGD.js"), b"core").unwrap();

        let states = Arc::new(Mutex::new(Vec::new()));
        let seen = states.clone();
        let installer = installer(tmp.path())
            .with_observer(Arc::new(move |s: LoadState| seen.lock().unwrap().push(s)));
        let loader = Loader::new(installer, FakeHost);

        let calls = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second"] {
            let calls = calls.clone();
            loader.listeners().subscribe(DiagnosticKind::Output, move |d| {
                calls.lock().unwrap().push(format!("{}:{}", name, d.message()));
            });
        }
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errs = errors.clone();
        loader.listeners().subscribe(DiagnosticKind::Error, move |d| {
            errs.lock().unwrap().push(d.message().to_string());
        });

        let handle = loader.load(Some(VersionTag::parse("v5.0.0").unwrap())).await.unwrap();
        assert_eq!(handle.tag().as_str(), "v5.0.0");
        assert_eq!(handle.dir(), dir.as_path());
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["first:booting".to_string(), "second:booting".to_string()]
        );
        assert_eq!(*errors.lock().unwrap(), vec!["no audio device".to_string()]);
        assert_eq!(*states.lock().unwrap(), vec![LoadState::Loading, LoadState::Ready]);
        assert_eq!(handle.shutdown().await, RuntimeExit::Killed);
    }

    #[tokio::test]
    async fn missing_core_binary_is_a_host_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("v1")).unwrap();
        let loader = Loader::new(installer(tmp.path()), FakeHost);
        let err = loader.load(Some(VersionTag::parse("v1").unwrap())).await.unwrap_err();
        assert!(matches!(err, LoadError::Host(HostError::MissingCoreBinary { .. })));
    }

    #[tokio::test]
    async fn failed_install_leaves_nothing_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Loader::new(installer(tmp.path()), FakeHost);
        let tag = VersionTag::parse("v2.0.0").unwrap();
        let err = loader.load(Some(tag.clone())).await.unwrap_err();
        assert!(matches!(err, LoadError::Install(InstallError::Resolve(_))));
        assert!(!loader.installer().cache().is_cached(&tag).await);
    }
}
