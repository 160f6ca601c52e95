//! Per-state counts over a set of outcome records.

use std::fmt;

use serde::Serialize;

use crate::job::{JobState, OutcomeRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    counts: [usize; STATES],
}

const STATES: usize = JobState::ALL.len();

fn index(state: JobState) -> usize {
    JobState::ALL
        .iter()
        .position(|s| *s == state)
        .unwrap_or_default()
}

impl DispatchSummary {
    pub fn from_records(records: &[OutcomeRecord]) -> Self {
        let mut summary = Self::default();
        for r in records {
            summary.total += 1;
            summary.counts[index(r.state)] += 1;
        }
        summary
    }

    pub fn count(&self, state: JobState) -> usize {
        self.counts[index(state)]
    }

    /// Items that ended in anything other than Succeeded or Submitted.
    pub fn failures(&self) -> usize {
        self.total - self.count(JobState::Succeeded) - self.count(JobState::Submitted)
    }

    pub fn all_ok(&self) -> bool {
        self.failures() == 0
    }
}

/// `3 folder(s): 2 succeeded, 1 failed` (zero counts omitted).
impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} folder(s)", self.total)?;
        let mut first = true;
        for state in JobState::ALL {
            let n = self.count(state);
            if n == 0 {
                continue;
            }
            f.write_str(if first { ": " } else { ", " })?;
            write!(f, "{n} {state}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Location;
    use chrono::Utc;

    fn rec(state: JobState) -> OutcomeRecord {
        let loc = Location {
            container_url: "https://a/c".into(),
            prefix: "1/".into(),
        };
        OutcomeRecord {
            item_id: 1,
            handle: None,
            source: loc.clone(),
            target: loc,
            state,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            last_external: None,
            error: None,
        }
    }

    #[test]
    fn counts_and_line() {
        let records = vec![
            rec(JobState::Succeeded),
            rec(JobState::Failed),
            rec(JobState::Succeeded),
            rec(JobState::TimedOut),
        ];
        let s = DispatchSummary::from_records(&records);
        assert_eq!(s.total, 4);
        assert_eq!(s.count(JobState::Succeeded), 2);
        assert_eq!(s.failures(), 2);
        assert!(!s.all_ok());
        assert_eq!(s.to_string(), "4 folder(s): 2 succeeded, 1 failed, 1 timed_out");
    }

    #[test]
    fn submitted_counts_as_ok() {
        let s = DispatchSummary::from_records(&[rec(JobState::Submitted)]);
        assert!(s.all_ok());
        assert_eq!(s.to_string(), "1 folder(s): 1 submitted");
        assert_eq!(DispatchSummary::default().to_string(), "0 folder(s)");
    }
}
