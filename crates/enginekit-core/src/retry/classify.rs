//! Map HTTP statuses and curl errors onto retry kinds.

use super::policy::ErrorKind;

/// Errors that know whether they are worth another attempt.
pub trait Retryable {
    fn retry_kind(&self) -> ErrorKind;
}

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_statuses() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn server_errors_are_retryable() {
        assert_eq!(classify_http_status(500), ErrorKind::Http5xx(500));
        assert_eq!(classify_http_status(504), ErrorKind::Http5xx(504));
    }

    #[test]
    fn client_errors_are_final() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(401), ErrorKind::Other);
    }
}
