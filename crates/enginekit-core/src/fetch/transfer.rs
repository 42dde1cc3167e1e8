//! Blocking libcurl transfers. Call from `spawn_blocking` when used from async code.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str;
use std::time::Duration;

use super::FetchError;

/// Per-transfer curl settings.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
            user_agent: concat!("enginekit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Path the body is streamed to before the final rename: `file.zip` → `file.zip.part`.
pub fn temp_path(dest: &Path) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

/// Reason phrase of the last status line seen (redirects produce several).
/// HTTP/2 has none, in which case this is empty.
fn reason_phrase(status_line: &str) -> String {
    let mut parts = status_line.trim().splitn(3, ' ');
    let _version = parts.next();
    let _code = parts.next();
    parts.next().unwrap_or("").trim().to_string()
}

fn configure(
    easy: &mut curl::easy::Easy,
    url: &str,
    headers: &[(String, String)],
    opts: &TransferOptions,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(&opts.user_agent)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;

    if !headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }
    Ok(())
}

/// Runs a GET and feeds the body to `sink`. Returns `(status code, reason phrase)`.
/// A sink error aborts the transfer and is returned as `FetchError::Io`.
fn perform<S>(
    url: &str,
    headers: &[(String, String)],
    opts: &TransferOptions,
    io_path: &Path,
    mut sink: S,
) -> Result<(u32, String), FetchError>
where
    S: FnMut(&[u8]) -> std::io::Result<()>,
{
    let transport = |source| FetchError::Transport {
        url: url.to_string(),
        source,
    };

    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, url, headers, opts).map_err(transport)?;

    let status_line = RefCell::new(String::new());
    let sink_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    if line.starts_with("HTTP/") {
                        *status_line.borrow_mut() = line.trim_end().to_string();
                    }
                }
                true
            })
            .map_err(transport)?;
        transfer
            .write_function(|data| match sink(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    *sink_error.borrow_mut() = Some(e);
                    Ok(0)
                }
            })
            .map_err(transport)?;
        transfer.perform()
    };

    if let Some(source) = sink_error.into_inner() {
        return Err(FetchError::Io {
            path: io_path.to_path_buf(),
            source,
        });
    }
    performed.map_err(transport)?;

    let code = easy.response_code().map_err(transport)?;
    let result = Ok((code, reason_phrase(&status_line.borrow())));
    result
}

fn bad_status(url: &str, code: u32, message: String) -> FetchError {
    FetchError::BadStatus {
        url: url.to_string(),
        code,
        message,
    }
}

/// Streams `url` into `dest`, overwriting it. The body goes to `dest.part` first and is
/// only renamed over `dest` after a 2xx response was fully written and synced; on any
/// failure the temp file is removed and `dest` is left untouched.
pub fn download_to_file(
    url: &str,
    dest: &Path,
    headers: &[(String, String)],
    opts: &TransferOptions,
) -> Result<u64, FetchError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| FetchError::Io { path, source }
    };
    let tmp = temp_path(dest);
    let file = File::create(&tmp).map_err(io_err(&tmp))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    let result = perform(url, headers, opts, &tmp, |data| {
        writer.write_all(data)?;
        written += data.len() as u64;
        Ok(())
    });

    let finished = result.and_then(|(code, message)| {
        if !(200..300).contains(&code) {
            return Err(bad_status(url, code, message));
        }
        let file = writer
            .into_inner()
            .map_err(|e| FetchError::Io {
                path: tmp.clone(),
                source: e.into_error(),
            })?;
        file.sync_all().map_err(io_err(&tmp))?;
        drop(file);
        fs::rename(&tmp, dest).map_err(io_err(dest))?;
        Ok(written)
    });

    if finished.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    finished
}

/// GETs `url` into memory. Meant for small API responses.
pub fn download_to_vec(
    url: &str,
    headers: &[(String, String)],
    opts: &TransferOptions,
) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    let (code, message) = perform(url, headers, opts, Path::new(url), |data| {
        body.extend_from_slice(data);
        Ok(())
    })?;
    if !(200..300).contains(&code) {
        return Err(bad_status(url, code, message));
    }
    Ok(body)
}
