//! REST client for the de-identification service.
//!
//! Jobs are created with `PUT {endpoint}/jobs/{name}` and observed with
//! `GET {endpoint}/jobs/{name}`, both carrying `api-version`. The bearer token
//! is taken verbatim from the environment; acquiring it is someone else's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::ServiceConfig;
use crate::http::{self, HttpRequest, HttpResponse, Method};
use crate::job::{ExternalStatus, JobHandle};

use super::error::ServiceError;
use super::{JobService, StatusReport, SubmitRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DeidClient {
    endpoint: String,
    api_version: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobResource {
    status: String,
    #[serde(default)]
    error: Option<JobErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JobErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl DeidClient {
    pub fn new(endpoint: &str, api_version: &str, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            token,
        }
    }

    /// Builds a client from config; the token comes from `cfg.token_env` if set.
    pub fn from_config(cfg: &ServiceConfig) -> Self {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            tracing::warn!(
                "{} is not set; requests to the service are unauthenticated",
                cfg.token_env
            );
        }
        Self::new(&cfg.endpoint, &cfg.api_version, token)
    }

    fn job_url(&self, handle: &JobHandle) -> String {
        format!(
            "{}/jobs/{}?api-version={}",
            self.endpoint,
            handle.as_str(),
            self.api_version
        )
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        let mut req = HttpRequest::new(method, url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        req
    }
}

/// JSON body for a job creation request.
pub(crate) fn submit_body(req: &SubmitRequest) -> serde_json::Value {
    json!({
        "operation": req.operation,
        "sourceLocation": {
            "location": req.source.container_url,
            "prefix": req.source.prefix,
        },
        "targetLocation": {
            "location": req.target.container_url,
            "prefix": req.target.prefix,
            "overwrite": true,
        },
    })
}

fn check_status(resp: &HttpResponse) -> Result<(), ServiceError> {
    match resp.status {
        s if (200..300).contains(&s) => Ok(()),
        401 | 403 => Err(ServiceError::Auth(format!(
            "HTTP {}: {}",
            resp.status,
            resp.text()
        ))),
        status => Err(ServiceError::Http {
            status,
            body: resp.text(),
        }),
    }
}

/// Parses a job resource into a status report.
pub(crate) fn parse_status(body: &[u8]) -> Result<StatusReport, ServiceError> {
    let job: JobResource =
        serde_json::from_slice(body).map_err(|e| ServiceError::Parse(e.to_string()))?;
    let status = ExternalStatus::from_service(&job.status)
        .ok_or_else(|| ServiceError::Parse(format!("unknown job status {:?}", job.status)))?;
    let detail = job.error.and_then(|e| match (e.code, e.message) {
        (Some(code), Some(msg)) => Some(format!("{code}: {msg}")),
        (None, Some(msg)) => Some(msg),
        (Some(code), None) => Some(code),
        (None, None) => None,
    });
    Ok(StatusReport { status, detail })
}

#[async_trait]
impl JobService for DeidClient {
    async fn submit(&self, req: &SubmitRequest) -> Result<(), ServiceError> {
        let body = serde_json::to_vec(&submit_body(req))
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        let http_req = self
            .request(Method::Put, self.job_url(&req.handle))
            .header("Content-Type", "application/json")
            .body(body);
        let resp = http::send(http_req, REQUEST_TIMEOUT).await?;
        check_status(&resp)?;
        tracing::debug!(handle = %req.handle, status = resp.status, "job accepted");
        Ok(())
    }

    async fn query_status(&self, handle: &JobHandle) -> Result<StatusReport, ServiceError> {
        let http_req = self.request(Method::Get, self.job_url(handle));
        let resp = http::send(http_req, REQUEST_TIMEOUT).await?;
        check_status(&resp)?;
        parse_status(&resp.body)
    }
}
