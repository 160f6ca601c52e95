//! Status polling with a fixed interval and a wall-clock budget.
//!
//! The budget starts when the job is submitted. Failed queries wait the same
//! interval as successful ones and are charged against the same budget.

use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::job::{ExternalStatus, JobHandle};
use crate::service::JobService;

/// Decision returned by the poll policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Query again after the given delay.
    PollAfter(Duration),
    /// Budget exhausted.
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    /// `elapsed` is measured from submission. The delay never overshoots the budget.
    pub fn decide(&self, elapsed: Duration) -> PollDecision {
        if elapsed >= self.max_wait {
            return PollDecision::GiveUp;
        }
        let remaining = self.max_wait - elapsed;
        PollDecision::PollAfter(self.interval.min(remaining))
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The service reported a terminal status.
    Terminal {
        status: ExternalStatus,
        detail: Option<String>,
    },
    /// Budget ran out; carries the last status seen, if any query succeeded.
    TimedOut { last_known: Option<ExternalStatus> },
}

/// Polls `handle` until a terminal status or until `policy.max_wait` has
/// elapsed since `started`. Query errors are logged and retried.
///
/// `on_status` is called for every successful observation (used to advance
/// the local job state to Running).
pub async fn poll_until_terminal<F>(
    service: &dyn JobService,
    handle: &JobHandle,
    policy: PollPolicy,
    started: Instant,
    mut on_status: F,
) -> PollOutcome
where
    F: FnMut(ExternalStatus) + Send,
{
    let deadline = started + policy.max_wait;
    let mut last_known = None;
    let mut failures = 0u32;

    loop {
        match timeout_at(deadline, service.query_status(handle)).await {
            Ok(Ok(report)) => {
                last_known = Some(report.status);
                on_status(report.status);
                if report.status.is_terminal() {
                    return PollOutcome::Terminal {
                        status: report.status,
                        detail: report.detail,
                    };
                }
                debug!(handle = %handle, status = %report.status, "job not finished");
            }
            Ok(Err(e)) => {
                failures += 1;
                if e.is_transient() {
                    warn!(handle = %handle, failures, "status query failed, will retry: {}", e);
                } else {
                    error!(handle = %handle, failures, "status query failed, will retry: {}", e);
                }
            }
            Err(_) => {
                warn!(handle = %handle, "status query still pending at deadline");
                return PollOutcome::TimedOut { last_known };
            }
        }

        match policy.decide(started.elapsed()) {
            PollDecision::GiveUp => return PollOutcome::TimedOut { last_known },
            PollDecision::PollAfter(delay) => sleep(delay).await,
        }
    }
}
