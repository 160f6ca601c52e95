//! Minimal blocking HTTP exchange over libcurl.
//!
//! Shared by the de-identification service client and the blob store. Runs in
//! the current thread; async callers go through [`send`], which moves the
//! transfer onto tokio's blocking pool.

use std::str;
use std::time::Duration;

/// Outgoing request. Headers are `Name: value` lines.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<String>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(format!("{}: {}", name.trim(), value.trim()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Error from the transfer itself (no HTTP status available).
#[derive(Debug)]
pub enum TransferError {
    Curl(curl::Error),
    /// The blocking task was cancelled or panicked.
    Join(String),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Join(e) => write!(f, "transfer task: {}", e),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Join(_) => None,
        }
    }
}

impl From<curl::Error> for TransferError {
    fn from(e: curl::Error) -> Self {
        TransferError::Curl(e)
    }
}

/// Performs `req` on the current thread.
pub fn perform(req: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransferError> {
    let mut headers: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&req.url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    for h in &req.headers {
        list.append(h)?;
    }
    if let Some(payload) = &req.body {
        easy.post_fields_copy(payload)?;
        // No 100-continue round trip for request bodies.
        list.append("Expect:")?;
    }
    // Set after the body: post fields would otherwise switch the verb to POST.
    easy.custom_request(req.method.as_str())?;
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                if !line.is_empty() {
                    headers.push(line.to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Async wrapper around [`perform`].
pub async fn send(req: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransferError> {
    tokio::task::spawn_blocking(move || perform(&req, timeout))
        .await
        .map_err(|e| TransferError::Join(e.to_string()))?
}

/// Value of the first header named `name` (case-insensitive).
pub fn header_value<'a>(headers: &'a [String], name: &str) -> Option<&'a str> {
    headers.iter().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim().eq_ignore_ascii_case(name) {
            Some(v.trim())
        } else {
            None
        }
    })
}
