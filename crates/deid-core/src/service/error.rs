//! Service error type and its classification for poll retry logging.

use thiserror::Error;

use crate::http::TransferError;

/// High-level classification of a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Service asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Retryable server-side failure (5xx).
    Http5xx(u16),
    /// Anything else (auth, bad request, malformed response).
    Other,
}

/// Error returned by a submit or status call.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport: {0}")]
    Transport(#[from] TransferError),

    #[error("HTTP {status}: {body}")]
    Http { status: u32, body: String },

    #[error("authentication: {0}")]
    Auth(String),

    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Transport(TransferError::Curl(e)) => classify_curl_error(e),
            ServiceError::Transport(TransferError::Join(_)) => ErrorKind::Other,
            ServiceError::Http { status, .. } => classify_http_status(*status),
            ServiceError::Auth(_) | ServiceError::Parse(_) => ErrorKind::Other,
        }
    }

    /// True when repeating the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Other)
    }
}

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}
