//! The per-item task: acquire a slot, submit, optionally poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::job::{JobHandle, JobState, OutcomeRecord, WorkItem};
use crate::poll::{poll_until_terminal, PollOutcome};
use crate::service::SubmitRequest;

use super::{DispatchContext, DispatchMode};

/// What the dispatcher knows about a task if the task itself never returns.
#[derive(Debug)]
pub(super) struct TaskTrace {
    started_at: DateTime<Utc>,
    handle: Mutex<Option<JobHandle>>,
    submitted: AtomicBool,
}

impl Default for TaskTrace {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            handle: Mutex::new(None),
            submitted: AtomicBool::new(false),
        }
    }
}

impl TaskTrace {
    fn set_handle(&self, handle: &JobHandle) {
        let mut slot = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(handle.clone());
    }

    /// Record for an item whose task panicked or was cancelled.
    pub(super) fn abandoned(&self, item: &WorkItem, detail: String) -> OutcomeRecord {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let state = if self.submitted.load(Ordering::Acquire) {
            JobState::Failed
        } else {
            JobState::SubmissionError
        };
        OutcomeRecord {
            item_id: item.id,
            handle,
            source: item.source.clone(),
            target: item.target.clone(),
            state,
            started_at: self.started_at,
            finished_at: Utc::now(),
            last_external: None,
            error: Some(detail),
        }
    }
}

/// Panic message (or cancellation) carried by a join error.
pub(super) fn join_error_detail(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    let payload = err.into_panic();
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("task panicked: {msg}")
}

fn outcome(
    item: &WorkItem,
    handle: Option<JobHandle>,
    state: JobState,
    started_at: DateTime<Utc>,
) -> OutcomeRecord {
    OutcomeRecord {
        item_id: item.id,
        handle,
        source: item.source.clone(),
        target: item.target.clone(),
        state,
        started_at,
        finished_at: Utc::now(),
        last_external: None,
        error: None,
    }
}

pub(super) async fn run_item(
    ctx: Arc<DispatchContext>,
    item: WorkItem,
    trace: Arc<TaskTrace>,
) -> OutcomeRecord {
    let started_at = trace.started_at;

    // Held until this function returns, on every path.
    let _slot = match ctx.limiter.acquire().await {
        Ok(guard) => guard,
        Err(e) => {
            error!(item = item.id, "no slot: {}", e);
            let mut rec = outcome(&item, None, JobState::SubmissionError, started_at);
            rec.error = Some(format!("slot limiter closed: {e}"));
            return rec;
        }
    };

    let handle = ctx.handles.next(item.id);
    trace.set_handle(&handle);
    let req = SubmitRequest {
        handle: handle.clone(),
        source: item.source.clone(),
        target: item.target.clone(),
        operation: ctx.options.operation.clone(),
    };

    debug!(item = item.id, handle = %handle, "submitting job");
    let submitted_at = Instant::now();
    if let Err(e) = ctx.service.submit(&req).await {
        error!(item = item.id, handle = %handle, kind = ?e.kind(), "submission failed: {}", e);
        let mut rec = outcome(&item, Some(handle), JobState::SubmissionError, started_at);
        rec.error = Some(e.to_string());
        return rec;
    }
    trace.submitted.store(true, Ordering::Release);
    info!(item = item.id, handle = %handle, "job submitted");
    ctx.recorder
        .note(format!("folder {} job {} submitted", item.id, handle));

    let mut state = JobState::Submitted;
    if ctx.options.mode == DispatchMode::FireAndForget {
        return outcome(&item, Some(handle), state, started_at);
    }

    let policy = ctx.options.poll_policy();
    let polled = poll_until_terminal(
        ctx.service.as_ref(),
        &handle,
        policy,
        submitted_at,
        |status| {
            if !status.is_terminal() && state.advance(status.job_state()) {
                debug!(handle = %handle, state = %status.job_state(), "job progressing");
            }
        },
    )
    .await;

    let mut rec = outcome(&item, Some(handle.clone()), state, started_at);
    match polled {
        PollOutcome::Terminal { status, detail } => {
            state.advance(status.job_state());
            rec.state = state;
            rec.last_external = Some(status);
            if state != JobState::Succeeded {
                rec.error = Some(detail.unwrap_or_else(|| format!("service reported {status}")));
            }
            info!(item = item.id, handle = %handle, state = %state, "job finished");
        }
        PollOutcome::TimedOut { last_known } => {
            state.advance(JobState::TimedOut);
            rec.state = state;
            rec.last_external = last_known;
            rec.error = Some(format!(
                "no terminal status within {}s",
                policy.max_wait.as_secs()
            ));
            warn!(item = item.id, handle = %handle, "job timed out");
        }
    }
    rec
}
