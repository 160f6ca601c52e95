//! Scripted in-memory job service for unit tests.
//!
//! Each item (parsed from the `deid-<item>-...` handle) has a script of status
//! steps; the last step repeats forever.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::http::TransferError;
use crate::job::{ExternalStatus, JobHandle};

use super::{JobService, ServiceError, StatusReport, SubmitRequest};

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Status(ExternalStatus),
    /// Query fails with a throttling error.
    Throttled,
    /// Query fails with a non-transient error.
    Broken,
    /// Query never returns.
    Hang,
    /// Query panics.
    Panic,
}

#[derive(Default)]
pub(crate) struct MockService {
    submit_failures: HashSet<u64>,
    submit_panics: HashSet<u64>,
    scripts: Mutex<HashMap<u64, VecDeque<Step>>>,
    submit_delay: Duration,
    submitting: AtomicUsize,
    submitting_peak: AtomicUsize,
    pub(crate) submitted: Mutex<Vec<SubmitRequest>>,
    pub(crate) queries: AtomicUsize,
}

pub(crate) fn item_of(handle: &JobHandle) -> u64 {
    handle
        .as_str()
        .split('-')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(u64::MAX)
}

impl MockService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, item: u64, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(item, steps.into_iter().collect());
        self
    }

    pub(crate) fn fail_submit(mut self, item: u64) -> Self {
        self.submit_failures.insert(item);
        self
    }

    pub(crate) fn panic_on_submit(mut self, item: u64) -> Self {
        self.submit_panics.insert(item);
        self
    }

    pub(crate) fn submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Most submit calls observed running at the same time.
    pub(crate) fn submitting_peak(&self) -> usize {
        self.submitting_peak.load(Ordering::SeqCst)
    }

    fn next_step(&self, item: u64) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&item) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps
                .front()
                .cloned()
                .unwrap_or(Step::Status(ExternalStatus::Succeeded)),
            None => Step::Status(ExternalStatus::Succeeded),
        }
    }
}

#[async_trait]
impl JobService for MockService {
    async fn submit(&self, req: &SubmitRequest) -> Result<(), ServiceError> {
        let now = self.submitting.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitting_peak.fetch_max(now, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submitting.fetch_sub(1, Ordering::SeqCst);

        let item = item_of(&req.handle);
        if self.submit_panics.contains(&item) {
            panic!("mock submit panic for item {item}");
        }
        self.submitted.lock().unwrap().push(req.clone());
        if self.submit_failures.contains(&item) {
            return Err(ServiceError::Http {
                status: 400,
                body: format!("invalid source location for {item}"),
            });
        }
        Ok(())
    }

    async fn query_status(&self, handle: &JobHandle) -> Result<StatusReport, ServiceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.next_step(item_of(handle)) {
            Step::Status(status) => Ok(StatusReport {
                status,
                detail: (status == ExternalStatus::Failed).then(|| "mock failure".to_string()),
            }),
            Step::Throttled => Err(ServiceError::Http {
                status: 429,
                body: "slow down".into(),
            }),
            Step::Broken => Err(ServiceError::Transport(TransferError::Join(
                "mock transport broke".into(),
            ))),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("mock status panic for {handle}"),
        }
    }
}
