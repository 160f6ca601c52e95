//! Run-level error taxonomy.
//!
//! Per-item failures (submission errors, timeouts) never appear here: they are
//! contained in the item's task and become an `OutcomeRecord`. Only errors that
//! stop the whole run are represented.

use thiserror::Error;

use crate::range::RangeError;

#[derive(Debug, Error)]
pub enum DeidError {
    /// Bad range, path or config value. Raised before anything is dispatched.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid folder range: {0}")]
    Range(#[from] RangeError),

    /// The user interrupted the run; the recorder was flushed best-effort.
    #[error("interrupted after {recorded} of {total} outcome(s) were recorded")]
    Interrupted { recorded: usize, total: usize },

    /// Anything unexpected outside the per-item task boundary.
    #[error("fatal: {0:#}")]
    Fatal(#[from] anyhow::Error),
}

impl DeidError {
    /// True for errors raised before any job was submitted.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DeidError::Configuration(_) | DeidError::Range(_))
    }
}
