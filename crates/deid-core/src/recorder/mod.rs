//! Outcome recorder: append-only buffers drained into the log sink.
//!
//! Two buffers, each behind its own mutex: outcome records and free-text
//! event lines. An append is a single push under the lock, so concurrent
//! dispatch tasks never interleave within one record or line. Locks are
//! never held across an await.

mod projection;

pub use projection::{csv_field, event_log_text, tracking_csv_text, TRACKING_HEADER};

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};

use crate::job::OutcomeRecord;
use crate::sink::LogSink;

/// Sink file/blob names for the two projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogNames {
    pub event_log: String,
    pub tracking_log: String,
}

#[derive(Debug, Default)]
pub struct OutcomeRecorder {
    records: Mutex<Vec<OutcomeRecord>>,
    events: Mutex<Vec<String>>,
}

/// A poisoned buffer still holds valid entries; keep using it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OutcomeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one timestamped line to the event log buffer.
    pub fn note(&self, message: impl AsRef<str>) {
        let line = format!(
            "{} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message.as_ref()
        );
        lock(&self.events).push(line);
    }

    /// Appends a terminal outcome and its event line.
    pub fn record(&self, outcome: OutcomeRecord) {
        let mut line = format!(
            "folder {} job {} {}",
            outcome.item_id,
            outcome.handle_str(),
            outcome.state
        );
        if let Some(ext) = outcome.last_external {
            line.push_str(&format!(" (service status {ext})"));
        }
        if let Some(err) = &outcome.error {
            line.push_str(&format!(": {err}"));
        }
        lock(&self.records).push(outcome);
        self.note(line);
    }

    /// Number of records currently buffered.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_records(&self) -> Vec<OutcomeRecord> {
        lock(&self.records).clone()
    }

    /// Takes all buffered records, leaving the buffer empty.
    pub fn drain_records(&self) -> Vec<OutcomeRecord> {
        std::mem::take(&mut *lock(&self.records))
    }

    /// Takes all buffered event lines, leaving the buffer empty.
    pub fn drain_events(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.events))
    }

    /// Drains both buffers and appends their projections to `sink`.
    ///
    /// On a sink error the drained content is put back so a later flush can
    /// retry it.
    pub async fn flush(&self, sink: &dyn LogSink, names: &LogNames) -> Result<()> {
        let events = self.drain_events();
        let records = self.drain_records();

        if !events.is_empty() {
            if let Err(e) = sink
                .append(&names.event_log, None, &event_log_text(&events))
                .await
            {
                self.restore(events, records);
                return Err(e);
            }
        }
        if !records.is_empty() {
            if let Err(e) = sink
                .append(
                    &names.tracking_log,
                    Some(TRACKING_HEADER),
                    &tracking_csv_text(&records),
                )
                .await
            {
                self.restore(Vec::new(), records);
                return Err(e);
            }
        }
        Ok(())
    }

    fn restore(&self, events: Vec<String>, records: Vec<OutcomeRecord>) {
        if !events.is_empty() {
            let mut buf = lock(&self.events);
            let newer = std::mem::replace(&mut *buf, events);
            buf.extend(newer);
        }
        if !records.is_empty() {
            let mut buf = lock(&self.records);
            let newer = std::mem::replace(&mut *buf, records);
            buf.extend(newer);
        }
    }
}
