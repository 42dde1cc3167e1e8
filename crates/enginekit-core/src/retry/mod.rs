//! Retry and backoff policy for network transfers.
//!
//! Errors are classified into coarse kinds (timeouts, throttling, connection
//! failures, 5xx) and the policy turns a kind plus attempt number into either
//! a backoff delay or a final failure.

mod classify;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status, Retryable};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
