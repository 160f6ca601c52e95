//! CLI command handlers, one per file.

mod collect;
mod config;
mod merge;
mod run;
mod split;
mod stage;
mod status;

pub use collect::run_collect;
pub use config::run_config;
pub use merge::run_merge;
pub use run::{run_range_command, RunArgs};
pub use split::{run_split, SplitArgs};
pub use stage::run_stage;
pub use status::run_status;
