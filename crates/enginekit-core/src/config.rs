use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Upstream project the releases are fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// `owner/repo` slug; also used to compute the archive's top-level folder.
    pub repo: String,
    /// Base of the release API (`{api_base}/releases/latest`, `{api_base}/git/ref/tags/{tag}`).
    pub api_base: String,
    /// Source archive download URL; `{tag}` is substituted.
    pub archive_url: String,
    /// Directory holding the compiled binaries for a commit; `{commit}` is substituted.
    pub binary_base_url: String,
    /// Optional API token sent as `Authorization: Bearer` to the release API.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            repo: "4ian/GDevelop".to_string(),
            api_base: "https://api.github.com/repos/4ian/GDevelop".to_string(),
            archive_url: "https://codeload.github.com/4ian/GDevelop/legacy.zip/{tag}".to_string(),
            binary_base_url: "https://s3.amazonaws.com/gdevelop-gdevelop.js/master/commit/{commit}"
                .to_string(),
            token: None,
        }
    }
}

/// File names expected under the binary base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactNames {
    /// Core binary (required).
    pub core: String,
    /// Memory image companion (optional; older releases only).
    pub memory_image: String,
    /// Portable binary companion (optional; newer releases only).
    pub portable: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            core: "libGD.js".to_string(),
            memory_image: "libGD.js.mem".to_string(),
            portable: "libGD.wasm".to_string(),
        }
    }
}

/// HTTP client parameters shared by every transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole transfer, including the body.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 3600,
            user_agent: concat!("enginekit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per transfer (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 0.5,
            max_delay_secs: 20,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

/// Post-extraction compilation of the runtime sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// File inside `Runtime/` whose presence means the sources are not compiled yet.
    pub marker: String,
    /// External build command, run with `Runtime/` as working directory.
    pub command: Vec<String>,
    /// Append the relative paths of all TypeScript sources to `command`.
    #[serde(default = "default_true")]
    pub append_sources: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            marker: "runtimegame.ts".to_string(),
            command: vec![
                "npx".to_string(),
                "--yes".to_string(),
                "esbuild".to_string(),
                "--log-level=warning".to_string(),
                "--outdir=.".to_string(),
                "--allow-overwrite".to_string(),
            ],
            append_sources: true,
        }
    }
}

/// Line the default launcher prints once the core module has initialized.
pub const READY_LINE: &str = "enginekit:ready";

/// Node bootstrap for the core module. The core exports a factory whose result
/// settles once the engine is initialized; `process.argv[1]` is the core path.
const NODE_BOOTSTRAP: &str = "const m = require(require('path').resolve(process.argv[1])); \
Promise.resolve(typeof m === 'function' ? m() : m).then(() => console.log('enginekit:ready'));";

/// How the core binary is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Program (and leading args) the core binary path is appended to. Empty = execute directly.
    pub launcher: Vec<String>,
    /// Stdout line the runtime prints once initialized. `None` = ready as soon as it spawns.
    /// The default launcher prints [`READY_LINE`].
    #[serde(default)]
    pub ready_line: Option<String>,
    pub ready_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            launcher: vec!["node".to_string(), "-e".to_string(), NODE_BOOTSTRAP.to_string()],
            ready_line: Some(READY_LINE.to_string()),
            ready_timeout_secs: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/enginekit/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineKitConfig {
    /// Root of the per-version cache. Defaults to `$XDG_DATA_HOME/enginekit/Versions`.
    #[serde(default)]
    pub versions_dir: Option<PathBuf>,
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default)]
    pub artifacts: ArtifactNames,
    #[serde(default)]
    pub http: HttpConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub host: HostConfig,
}

impl EngineKitConfig {
    /// Effective versions root: the configured one, or the XDG data default.
    pub fn versions_root(&self) -> Result<PathBuf> {
        match &self.versions_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("enginekit")?;
                Ok(xdg_dirs.get_data_home().join("Versions"))
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("enginekit")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineKitConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineKitConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: EngineKitConfig = toml::from_str(&data)?;
    Ok(cfg)
}
