//! De-identification job service: the submit/status seam and its HTTP client.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use client::DeidClient;
pub use error::{classify_curl_error, classify_http_status, ErrorKind, ServiceError};

use async_trait::async_trait;

use crate::job::{ExternalStatus, JobHandle, Location};

/// Everything the service needs to start one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub handle: JobHandle,
    pub source: Location,
    pub target: Location,
    pub operation: String,
}

/// One status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: ExternalStatus,
    /// Error message or other detail the service attached.
    pub detail: Option<String>,
}

impl StatusReport {
    pub fn new(status: ExternalStatus) -> Self {
        Self {
            status,
            detail: None,
        }
    }
}

/// External job submission and status service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Starts a job. Ok means the service accepted it.
    async fn submit(&self, req: &SubmitRequest) -> Result<(), ServiceError>;

    async fn query_status(&self, handle: &JobHandle) -> Result<StatusReport, ServiceError>;
}
