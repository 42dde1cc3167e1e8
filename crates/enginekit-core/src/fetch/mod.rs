//! Artifact fetcher: HTTP GET of a remote resource to a local path.
//!
//! Each request carries a [`FetchPolicy`]. A required resource that answers with
//! a non-2xx status fails the fetch; an optional one is skipped without leaving
//! anything on disk. Transient failures are retried per [`RetryPolicy`] before the
//! policy is applied.

mod transfer;

pub use transfer::{download_to_file, download_to_vec, temp_path, TransferOptions};

use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::EngineKitConfig;
use crate::retry::{classify_curl_error, classify_http_status, run_with_retry, ErrorKind, RetryPolicy, Retryable};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered outside 2xx. `message` is the status line's reason phrase.
    #[error("GET {url} returned HTTP {code} {message}")]
    BadStatus { url: String, code: u32, message: String },
    /// Connection, TLS or timeout failure reported by curl.
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: curl::Error,
    },
    /// Creating, writing or renaming the local file failed.
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A metadata response was not the expected JSON shape.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// The blocking transfer task panicked or was cancelled.
    #[error("transfer task for {url} did not complete: {reason}")]
    Aborted { url: String, reason: String },
    /// Rejected before any request was made: unparseable or not http(s).
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl Retryable for FetchError {
    fn retry_kind(&self) -> ErrorKind {
        match self {
            FetchError::BadStatus { code, .. } => classify_http_status(*code),
            FetchError::Transport { source, .. } => classify_curl_error(source),
            FetchError::Io { .. }
            | FetchError::Decode { .. }
            | FetchError::Aborted { .. }
            | FetchError::InvalidUrl { .. } => ErrorKind::Other,
        }
    }
}

/// Only absolute http(s) URLs are handed to curl.
pub fn check_url(raw: &str) -> Result<url::Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme {}", other))),
    }
}

/// Whether a resource must exist upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    Required,
    Optional,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub dest: PathBuf,
    pub policy: FetchPolicy,
}

impl FetchRequest {
    pub fn required(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            policy: FetchPolicy::Required,
        }
    }

    pub fn optional(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            policy: FetchPolicy::Optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body written to `path`.
    Written { path: PathBuf, bytes: u64 },
    /// Optional resource answered with a non-2xx status; nothing was written.
    Skipped { code: u32 },
}

/// Async front-end over the blocking curl transfers.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    options: TransferOptions,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(options: TransferOptions, retry: RetryPolicy) -> Self {
        Self { options, retry }
    }

    pub fn from_config(cfg: &EngineKitConfig) -> Self {
        let options = TransferOptions {
            connect_timeout: Duration::from_secs(cfg.http.connect_timeout_secs),
            timeout: Duration::from_secs(cfg.http.timeout_secs),
            user_agent: cfg.http.user_agent.clone(),
        };
        Self::new(options, cfg.retry_policy())
    }

    /// Downloads `request.url` to `request.dest`, applying the request's policy.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        tracing::debug!(url = %request.url, dest = %request.dest.display(), "fetching");
        check_url(&request.url)?;
        let result = run_with_retry(&self.retry, &request.url, || {
            let url = request.url.clone();
            let dest = request.dest.clone();
            let opts = self.options.clone();
            async move {
                tokio::task::spawn_blocking({
                    let url = url.clone();
                    move || download_to_file(&url, &dest, &[], &opts)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(FetchError::Aborted {
                        url,
                        reason: e.to_string(),
                    })
                })
            }
        })
        .await;

        match (result, request.policy) {
            (Ok(bytes), _) => {
                tracing::info!(
                    "downloaded {} ({} bytes) to {}",
                    request.url,
                    bytes,
                    request.dest.display()
                );
                Ok(FetchOutcome::Written {
                    path: request.dest.clone(),
                    bytes,
                })
            }
            (Err(FetchError::BadStatus { code, .. }), FetchPolicy::Optional) => {
                tracing::info!("optional resource {} not available (HTTP {}), skipping", request.url, code);
                Ok(FetchOutcome::Skipped { code })
            }
            (Err(e), _) => Err(e),
        }
    }

    /// GETs a JSON document with extra request headers and deserializes it.
    pub async fn fetch_json<T>(&self, url: &str, headers: &[(String, String)]) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        check_url(url)?;
        let body = run_with_retry(&self.retry, url, || {
            let url = url.to_string();
            let headers = headers.to_vec();
            let opts = self.options.clone();
            async move {
                tokio::task::spawn_blocking({
                    let url = url.clone();
                    move || download_to_vec(&url, &headers, &opts)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(FetchError::Aborted {
                        url,
                        reason: e.to_string(),
                    })
                })
            }
        })
        .await?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
