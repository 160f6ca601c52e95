//! Job dispatcher: one task per work item, bounded by the slot limiter.
//!
//! Every item yields exactly one `OutcomeRecord`, including items whose task
//! panicked. `dispatch` returns only after all tasks have finished.

mod summary;
mod task;

pub use summary::DispatchSummary;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::DispatchConfig;
use crate::job::{HandleGenerator, OutcomeRecord, WorkItem};
use crate::limiter::SlotLimiter;
use crate::poll::PollPolicy;
use crate::recorder::OutcomeRecorder;
use crate::service::JobService;

use self::task::{run_item, TaskTrace};

/// What a task does after the service accepts its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Record `Submitted` and release the slot.
    #[serde(rename = "fire-and-forget")]
    FireAndForget,
    /// Keep the slot and poll until a terminal status or the time budget.
    #[default]
    #[serde(rename = "poll")]
    PollToCompletion,
}

impl DispatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchMode::FireAndForget => "fire-and-forget",
            DispatchMode::PollToCompletion => "poll",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub mode: DispatchMode,
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Job operation passed to the service ("Surrogate", "Redact", "Tag").
    pub operation: String,
}

impl DispatchOptions {
    pub fn from_config(cfg: &DispatchConfig, operation: &str) -> Self {
        Self {
            mode: cfg.mode,
            concurrency: cfg.concurrency,
            poll_interval: cfg.poll_interval(),
            max_wait: cfg.max_wait(),
            operation: operation.to_string(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.max_wait)
    }
}

/// State shared by all tasks of one dispatch.
pub(crate) struct DispatchContext {
    pub(crate) service: Arc<dyn JobService>,
    pub(crate) recorder: Arc<OutcomeRecorder>,
    pub(crate) limiter: SlotLimiter,
    pub(crate) handles: HandleGenerator,
    pub(crate) options: DispatchOptions,
}

pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
}

impl Dispatcher {
    pub fn new(
        service: Arc<dyn JobService>,
        recorder: Arc<OutcomeRecorder>,
        options: DispatchOptions,
    ) -> Self {
        Self::with_handles(service, recorder, options, HandleGenerator::new())
    }

    /// Same as [`Dispatcher::new`] with a caller-supplied handle generator.
    pub fn with_handles(
        service: Arc<dyn JobService>,
        recorder: Arc<OutcomeRecorder>,
        options: DispatchOptions,
        handles: HandleGenerator,
    ) -> Self {
        let limiter = SlotLimiter::new(options.concurrency);
        Self {
            ctx: Arc::new(DispatchContext {
                service,
                recorder,
                limiter,
                handles,
                options,
            }),
        }
    }

    pub fn limiter(&self) -> &SlotLimiter {
        &self.ctx.limiter
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.ctx.options
    }

    /// Launches one task per item and waits for all of them.
    ///
    /// Each outcome is appended to the recorder and, if `events` is given,
    /// sent there as soon as its task finishes. Records come back in
    /// completion order.
    pub async fn dispatch(
        &self,
        items: Vec<WorkItem>,
        events: Option<mpsc::Sender<OutcomeRecord>>,
    ) -> Vec<OutcomeRecord> {
        let total = items.len();
        let opts = &self.ctx.options;
        self.ctx.recorder.note(format!(
            "dispatching {} folder(s) with {} slot(s), mode {}",
            total,
            self.ctx.limiter.capacity(),
            opts.mode
        ));
        tracing::info!(
            items = total,
            slots = self.ctx.limiter.capacity(),
            mode = %opts.mode,
            "dispatch started"
        );

        let mut join_set = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);
        for item in items {
            let trace = Arc::new(TaskTrace::default());
            let ctx = Arc::clone(&self.ctx);
            let task_item = item.clone();
            let task_trace = Arc::clone(&trace);
            let abort = join_set.spawn(async move { run_item(ctx, task_item, task_trace).await });
            pending.insert(abort.id(), (item, trace));
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next_with_id().await {
            let record = match joined {
                Ok((id, record)) => {
                    pending.remove(&id);
                    record
                }
                Err(e) => {
                    let Some((item, trace)) = pending.remove(&e.id()) else {
                        tracing::error!("unknown dispatch task ended: {}", e);
                        continue;
                    };
                    let detail = task::join_error_detail(e);
                    tracing::error!(item = item.id, "dispatch task died: {}", detail);
                    trace.abandoned(&item, detail)
                }
            };

            self.ctx.recorder.record(record.clone());
            if let Some(tx) = &events {
                // Receiver gone only means nobody is watching progress.
                let _ = tx.send(record.clone()).await;
            }
            records.push(record);
        }

        tracing::info!(
            items = records.len(),
            peak_slots = self.ctx.limiter.peak(),
            "dispatch finished"
        );
        records
    }
}
