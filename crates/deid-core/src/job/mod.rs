//! Work items, job handles, job states and outcome records.

mod handle;
mod state;
mod types;

pub use handle::{HandleGenerator, JobHandle, MAX_HANDLE_LEN};
pub use state::{ExternalStatus, JobState};
pub use types::{Location, OutcomeRecord, StorageLayout, WorkItem};
